#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any input may be rejected, nothing may panic. A config that passes
    // validation must also map cleanly into the runtime rig config.
    let Ok(cfg) = rotor_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let rig = rotor_core::RigCfg::from(&cfg);
        assert!(rig.filter.height_window >= 1);
        assert!(rig.mailbox.capacity >= 1);
        assert!(rig.control.height.max_duty <= 99 && rig.control.yaw.max_duty <= 99);
    }
});
