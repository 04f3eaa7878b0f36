use std::ffi::{c_char, CStr};
use std::ptr;

use log::{warn, LevelFilter};

use crate::auv::{AuvController, Direction, Mode};
use crate::auv::thrust_mixer::{DOF_COUNT, THRUSTER_COUNT};
use crate::config::ControllerConfig;
use crate::error::ControlError;
use crate::logging;
use crate::uart::MotorCommand;

//return codes shared by every call below
pub const BIBI_OK: i32 = 0;
pub const BIBI_ERR_NULL: i32 = -1;
pub const BIBI_ERR_INVALID: i32 = -2;
pub const BIBI_ERR_IO: i32 = -3;

pub struct BibiHelm{
    inner: AuvController,
}

fn into_handle(controller: AuvController) -> *mut BibiHelm{
    Box::into_raw(Box::new(BibiHelm{ inner: controller }))
}

/// Open the serial channels and start the control tasks.
/// `config_json` may be null for the stock configuration. Returns null on failure.
/// Installs the console logger at the configured `log_level`.
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_open(config_json: *const c_char) -> *mut BibiHelm{
    let config = if config_json.is_null(){
        ControllerConfig::default()
    }else{
        let parsed = match unsafe{ CStr::from_ptr(config_json) }.to_str(){
            Ok(s) => ControllerConfig::from_json_str(s),
            Err(e) => Err(ControlError::Config(e.to_string())),
        };
        match parsed{
            Ok(c) => c,
            Err(e) =>{
                //no level to go on, report at the default one
                logging::init(LevelFilter::Info);
                warn!(target: "controller", "{}", e);
                return ptr::null_mut();
            }
        }
    };
    logging::init(config.log_level());

    let controller = match AuvController::open(config){
        Ok(c) => c,
        Err(e) =>{
            warn!(target: "controller", "{}", e);
            return ptr::null_mut();
        }
    };
    if let Err(e) = controller.start(){
        warn!(target: "controller", "{}", e);
        return ptr::null_mut();
    }
    into_handle(controller)
}

/// Stop the tasks (thrusters go neutral) and release the handle
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_free(helm: *mut BibiHelm){
    if !helm.is_null(){
        unsafe{ drop(Box::from_raw(helm)); }
    }
}

#[no_mangle]
pub unsafe extern "C" fn bibi_helm_joystick(
    helm: *mut BibiHelm,
    surge: f32,
    sway: f32,
    heave: f32,
    buttons: *const i32,
    button_count: usize,
) -> i32{
    if helm.is_null() || (buttons.is_null() && button_count > 0){
        return BIBI_ERR_NULL;
    }

    unsafe{
        let h = &*helm;
        let buttons = if button_count == 0{
            &[][..]
        }else{
            std::slice::from_raw_parts(buttons, button_count)
        };
        match h.inner.joystick(surge, sway, heave, buttons){
            Ok(_) => BIBI_OK,
            Err(_) => BIBI_ERR_INVALID,
        }
    }
}

//out must hold THRUSTER_COUNT ints
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_current_pwm(helm: *mut BibiHelm, out: *mut i32) -> i32{
    if helm.is_null() || out.is_null(){
        return BIBI_ERR_NULL;
    }
    unsafe{
        let pwm = (*helm).inner.current_pwm().as_array();
        ptr::copy_nonoverlapping(pwm.as_ptr(), out, THRUSTER_COUNT);
    }
    BIBI_OK
}

#[no_mangle]
pub unsafe extern "C" fn bibi_helm_target_pwm(helm: *mut BibiHelm, out: *mut i32) -> i32{
    if helm.is_null() || out.is_null(){
        return BIBI_ERR_NULL;
    }
    unsafe{
        let pwm = (*helm).inner.target_pwm().as_array();
        ptr::copy_nonoverlapping(pwm.as_ptr(), out, THRUSTER_COUNT);
    }
    BIBI_OK
}

#[no_mangle]
pub unsafe extern "C" fn bibi_helm_switches(
    helm: *mut BibiHelm,
    out_left: *mut bool,
    out_right: *mut bool,
) -> i32{
    if helm.is_null() || out_left.is_null() || out_right.is_null(){
        return BIBI_ERR_NULL;
    }
    unsafe{
        let switches = (*helm).inner.switches();
        *out_left = switches.left;
        *out_right = switches.right;
    }
    BIBI_OK
}

//row-major, out must hold THRUSTER_COUNT * DOF_COUNT floats
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_get_tam(helm: *mut BibiHelm, out: *mut f32) -> i32{
    if helm.is_null() || out.is_null(){
        return BIBI_ERR_NULL;
    }
    unsafe{
        let flat: Vec<f32> = (*helm).inner.tam().rows().iter().flatten().copied().collect();
        ptr::copy_nonoverlapping(flat.as_ptr(), out, THRUSTER_COUNT * DOF_COUNT);
    }
    BIBI_OK
}

//a malformed matrix is rejected and the previous one stays in use
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_set_tam(helm: *mut BibiHelm, data: *const f32, len: usize) -> i32{
    if helm.is_null() || data.is_null(){
        return BIBI_ERR_NULL;
    }
    unsafe{
        if len % DOF_COUNT != 0{
            return BIBI_ERR_INVALID;
        }
        let values = std::slice::from_raw_parts(data, len);
        let rows: Vec<Vec<f32>> = values.chunks(DOF_COUNT).map(|c| c.to_vec()).collect();
        match (*helm).inner.set_tam(&rows){
            Ok(()) => BIBI_OK,
            Err(_) => BIBI_ERR_INVALID,
        }
    }
}

/// 0 manual, 1 auto, 2-5 semi-auto left/right/forward/down, -1 null handle
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_mode(helm: *mut BibiHelm) -> i32{
    if helm.is_null(){
        return BIBI_ERR_NULL;
    }
    mode_code(unsafe{ (*helm).inner.mode() })
}

fn mode_code(mode: Mode) -> i32{
    match mode{
        Mode::Manual => 0,
        Mode::Auto => 1,
        Mode::SemiAuto(Direction::Left) => 2,
        Mode::SemiAuto(Direction::Right) => 3,
        Mode::SemiAuto(Direction::Forward) => 4,
        Mode::SemiAuto(Direction::Down) => 5,
    }
}

/// Send a motor command; a null `direction` means stop. The reply is copied
/// into `out_reply` (nul-terminated, truncated to fit) and its length returned.
#[no_mangle]
pub unsafe extern "C" fn bibi_helm_motor_command(
    helm: *mut BibiHelm,
    id: u8,
    direction: *const c_char,
    speed: u16,
    out_reply: *mut c_char,
    max_len: usize,
) -> i32{
    if helm.is_null(){
        return BIBI_ERR_NULL;
    }

    unsafe{
        let command = if direction.is_null(){
            MotorCommand::stop(id)
        }else{
            let dir = match CStr::from_ptr(direction).to_str(){
                Ok(s) => s,
                Err(_) => return BIBI_ERR_INVALID,
            };
            match MotorCommand::run(id, dir, speed){
                Ok(c) => c,
                Err(_) => return BIBI_ERR_INVALID,
            }
        };

        let reply = match (*helm).inner.motor_command(&command){
            Ok(r) => r,
            Err(_) => return BIBI_ERR_IO,
        };

        if out_reply.is_null() || max_len == 0{
            return reply.len() as i32;
        }
        let n = reply.len().min(max_len - 1);
        ptr::copy_nonoverlapping(reply.as_ptr() as *const c_char, out_reply, n);
        *out_reply.add(n) = 0;
        n as i32
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::ffi::CString;
    use crate::auv::Channels;
    use crate::uart::mock::MockChannel;

    fn mock_handle() -> (*mut BibiHelm, MockChannel){
        let motor = MockChannel::new();
        let channels = Channels::from_devices(
            Box::new(MockChannel::new()),
            Box::new(motor.clone()),
            Box::new(MockChannel::new()),
        );
        (into_handle(AuvController::new(ControllerConfig::default(), channels)), motor)
    }

    #[test]
    fn test_ffi_null_handles(){
        let mut out = [0i32; 8];
        unsafe{
            assert_eq!(bibi_helm_current_pwm(ptr::null_mut(), out.as_mut_ptr()), BIBI_ERR_NULL);
            assert_eq!(bibi_helm_mode(ptr::null_mut()), BIBI_ERR_NULL);
            bibi_helm_free(ptr::null_mut());
        }
    }

    #[test]
    fn test_ffi_open_bad_config_is_null(){
        let bad = CString::new("{ not json").unwrap();
        unsafe{
            assert!(bibi_helm_open(bad.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_open_installs_logger_at_config_level(){
        let config = CString::new(
            r#"{"log_level":"debug","channels":{"thrusters":"/dev/bibi-helm-no-such-port","settle_ms":0}}"#,
        ).unwrap();
        unsafe{
            assert!(bibi_helm_open(config.as_ptr()).is_null());
        }
        //the open failure above was reported through an installed logger
        assert!(logging::is_installed());
        assert!(log::max_level() >= LevelFilter::Warn);
        let warn = log::Metadata::builder().level(log::Level::Warn).target("controller").build();
        assert!(log::logger().enabled(&warn));
    }

    #[test]
    fn test_ffi_joystick_and_pwm(){
        let (helm, _) = mock_handle();
        let buttons = [0i32; 8];
        let mut target = [0i32; 8];
        unsafe{
            for _ in 0..5{
                assert_eq!(bibi_helm_joystick(helm, 0.0, 0.0, 1.0, buttons.as_ptr(), 8), BIBI_OK);
            }
            assert_eq!(bibi_helm_target_pwm(helm, target.as_mut_ptr()), BIBI_OK);
            assert_eq!(target, [1100, 1100, 1500, 1500, 1500, 1500, 1900, 1900]);
            assert_eq!(bibi_helm_joystick(helm, f32::NAN, 0.0, 0.0, buttons.as_ptr(), 8), BIBI_ERR_INVALID);
            bibi_helm_free(helm);
        }
    }

    #[test]
    fn test_ffi_semi_auto_mode_code(){
        let (helm, _) = mock_handle();
        let mut buttons = [0i32; 8];
        buttons[6] = 1;
        unsafe{
            bibi_helm_joystick(helm, 0.0, 0.0, 0.0, buttons.as_ptr(), 8);
            assert_eq!(bibi_helm_mode(helm), 4);
            bibi_helm_free(helm);
        }
    }

    #[test]
    fn test_ffi_tam_get_set(){
        let (helm, _) = mock_handle();
        let mut tam = [0f32; 24];
        unsafe{
            assert_eq!(bibi_helm_get_tam(helm, tam.as_mut_ptr()), BIBI_OK);
            assert_eq!(&tam[..3], &[0.0, 1.0, -1.0]);

            let replacement = [0.5f32; 24];
            assert_eq!(bibi_helm_set_tam(helm, replacement.as_ptr(), 24), BIBI_OK);
            assert_eq!(bibi_helm_set_tam(helm, replacement.as_ptr(), 23), BIBI_ERR_INVALID);
            bibi_helm_get_tam(helm, tam.as_mut_ptr());
            assert_eq!(tam, [0.5f32; 24]);
            bibi_helm_free(helm);
        }
    }

    #[test]
    fn test_ffi_switches_default_open(){
        let (helm, _) = mock_handle();
        let mut left = true;
        let mut right = true;
        unsafe{
            assert_eq!(bibi_helm_switches(helm, &mut left, &mut right), BIBI_OK);
            bibi_helm_free(helm);
        }
        assert!(!left && !right);
    }

    #[test]
    fn test_ffi_motor_command_reply(){
        let (helm, motor) = mock_handle();
        motor.push_incoming("ACK");
        let dir = CString::new("back").unwrap();
        let mut reply = [0 as c_char; 16];
        unsafe{
            let n = bibi_helm_motor_command(helm, 2, dir.as_ptr(), 90, reply.as_mut_ptr(), 16);
            assert_eq!(n, 3);
            assert_eq!(CStr::from_ptr(reply.as_ptr()).to_str().unwrap(), "ACK");
            assert_eq!(motor.written(), vec!["M2 BACK 90\n".to_string()]);

            assert_eq!(bibi_helm_motor_command(helm, 2, ptr::null(), 0, ptr::null_mut(), 0), 0);
            bibi_helm_free(helm);
        }
    }
}
