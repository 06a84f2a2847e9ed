use can_timing::device::devices;
use can_timing::timing::DEFAULT_TARGET_SJW;
use tracing_subscriber;

fn main() {
    tracing_subscriber::fmt::init();

    for device in devices() {
        println!("{} ({}), {} MHz", device.name, device.comment, device.input_clock_hz / 1_000_000);

        for phase in device.phases() {
            for bitrate in device.supported_bitrates(phase) {
                println!("  {} phase, {:.1} kbps", phase, bitrate as f64 / 1000.0);
                println!("    SP [%]   TQ [ns]   TQ/BT  TSEG1      TSEG2      BRP        SJW");

                let timings = device
                    .timings(bitrate, DEFAULT_TARGET_SJW, phase, true)
                    .unwrap();
                for t in &timings {
                    let r = device.register_values(t);
                    println!(
                        "    {:<8.3} {:<9.3} {:<6} {:<3}({:<3})   {:<3}({:<3})   {:<3}({:<3})   {:<3}({:<3})",
                        t.sample_point,
                        t.time_quantum_ns(),
                        t.quanta_per_bit_time,
                        t.tseg1,
                        r.tseg1,
                        t.tseg2,
                        r.tseg2,
                        t.prescaler,
                        r.prescaler,
                        t.sjw_actual,
                        r.sjw,
                    );
                }
            }
        }
    }
}
