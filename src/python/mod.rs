use pyo3::prelude::*;
use pyo3::exceptions::{PyIOError, PyValueError};

use crate::auv::{AuvController, Channels};
use crate::config::ControllerConfig;
use crate::error::ControlError;
use crate::logging;
use crate::uart::MotorCommand;
use crate::uart::mock::MockChannel;

fn to_py_err(e: ControlError) -> PyErr{
    match e{
        ControlError::ChannelOpen{ .. } | ControlError::Io(_) => PyIOError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

#[pyclass]
pub struct PyAuvController{
    inner: AuvController,
}

#[pymethods]
impl PyAuvController{
    //opens the serial ports named in the JSON config (stock ports if omitted)
    //and installs the console logger at the configured level
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self>{
        let config = match config_json{
            Some(text) => ControllerConfig::from_json_str(text).map_err(to_py_err)?,
            None => ControllerConfig::default(),
        };
        logging::init(config.log_level());
        let inner = AuvController::open(config).map_err(to_py_err)?;
        Ok(PyAuvController{ inner })
    }

    //in-memory channels, for dry runs without hardware
    #[staticmethod]
    fn dry_run() -> Self{
        let channels = Channels::from_devices(
            Box::new(MockChannel::new()),
            Box::new(MockChannel::new()),
            Box::new(MockChannel::new()),
        );
        PyAuvController{ inner: AuvController::new(ControllerConfig::default(), channels) }
    }

    fn start(&self) -> PyResult<()>{
        self.inner.start().map_err(to_py_err)
    }

    fn shutdown(&self){
        self.inner.shutdown();
    }

    #[pyo3(signature = (surge, sway, heave, buttons=Vec::new()))]
    fn joystick(&self, surge: f32, sway: f32, heave: f32, buttons: Vec<i32>) -> PyResult<()>{
        self.inner.joystick(surge, sway, heave, &buttons).map(|_| ()).map_err(to_py_err)
    }

    fn cancel_auto(&self) -> bool{
        self.inner.cancel_auto()
    }

    fn current_pwm(&self) -> Vec<i32>{
        self.inner.current_pwm().as_array().to_vec()
    }

    fn target_pwm(&self) -> Vec<i32>{
        self.inner.target_pwm().as_array().to_vec()
    }

    fn switches(&self) -> (bool, bool){
        let s = self.inner.switches();
        (s.left, s.right)
    }

    fn mode(&self) -> String{
        self.inner.mode().to_string()
    }

    fn get_tam(&self) -> Vec<Vec<f32>>{
        self.inner.tam().to_rows()
    }

    fn set_tam(&self, rows: Vec<Vec<f32>>) -> PyResult<()>{
        self.inner.set_tam(&rows).map_err(to_py_err)
    }

    #[pyo3(signature = (id, direction, speed=0))]
    fn motor_command(&self, id: u8, direction: &str, speed: u16) -> PyResult<String>{
        let command = MotorCommand::run(id, direction, speed).map_err(to_py_err)?;
        self.inner.motor_command(&command).map_err(to_py_err)
    }

    //latest (current_pwm, target_pwm, switches, mode), as pushed to a new observer
    fn snapshot(&self) -> (Vec<i32>, Vec<i32>, (bool, bool), String){
        let snap = self.inner.snapshot();
        (
            snap.current.as_array().to_vec(),
            snap.target.as_array().to_vec(),
            (snap.switches.left, snap.switches.right),
            snap.mode.to_string(),
        )
    }
}

#[pymodule]
fn bibi_helm(_py: Python, m: &PyModule) -> PyResult<()>{
    m.add_class::<PyAuvController>()?;
    Ok(())
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_py_dry_run_joystick(){
        let controller = PyAuvController::dry_run();
        for _ in 0..5{
            controller.joystick(1.0, 0.0, 0.0, vec![0; 8]).unwrap();
        }
        assert_eq!(controller.target_pwm()[2], 1900);
        assert_eq!(controller.mode(), "manual");
    }

    #[test]
    fn test_py_tam_rejects_bad_shape(){
        let controller = PyAuvController::dry_run();
        let before = controller.get_tam();
        assert!(controller.set_tam(vec![vec![1.0]]).is_err());
        assert_eq!(controller.get_tam(), before);
    }

    #[test]
    fn test_py_new_installs_logger(){
        let config = r#"{"log_level":"info","channels":{"thrusters":"/dev/bibi-helm-no-such-port","settle_ms":0}}"#;
        assert!(PyAuvController::new(Some(config)).is_err());
        assert!(logging::is_installed());
        assert!(log::max_level() >= log::LevelFilter::Warn);
    }

    #[test]
    fn test_py_snapshot(){
        let controller = PyAuvController::dry_run();
        let (current, target, switches, mode) = controller.snapshot();
        assert_eq!(current, vec![1500; 8]);
        assert_eq!(target, vec![1500; 8]);
        assert_eq!(switches, (false, false));
        assert_eq!(mode, "manual");
    }
}
