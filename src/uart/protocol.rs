use crate::auv::state::SwitchState;
use crate::auv::thrust_mixer::{PwmVector, THRUSTER_COUNT};
use crate::error::{ControlError, Result};

//actuator line: "<index>:<pwm>\n", index is 1-based
pub fn encode_thruster_line(index: usize, pwm: i32) -> String{
    format!("{}:{}\n", index + 1, pwm)
}

//one line per thruster, in thruster order
pub fn encode_thruster_frame(pwm: &PwmVector) -> Vec<String>{
    pwm.as_array()
        .iter()
        .enumerate()
        .map(|(i, &v)| encode_thruster_line(i, v))
        .collect()
}

//inverse of encode_thruster_line, returns the 0-based index
pub fn parse_thruster_line(line: &str) -> Option<(usize, i32)>{
    let (idx, pwm) = line.trim().split_once(':')?;
    let idx: usize = idx.trim().parse().ok()?;
    let pwm: i32 = pwm.trim().parse().ok()?;
    if idx == 0 || idx > THRUSTER_COUNT{
        return None;
    }
    Some((idx - 1, pwm))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotorAction{
    Run{ direction: String, speed: u16 },
    Stop,
}

//auxiliary motor command: "M<id> <DIRECTION> <speed>\n" or "M<id> STOP\n"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorCommand{
    pub id: u8,
    pub action: MotorAction,
}

impl MotorCommand{
    pub fn run(id: u8, direction: &str, speed: u16) -> Result<Self>{
        let direction = direction.trim().to_ascii_uppercase();
        if direction.is_empty() || !direction.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'){
            return Err(ControlError::InvalidMotorCommand(format!(
                "bad direction token {:?}", direction
            )));
        }
        if direction == "STOP"{
            return Ok(Self::stop(id));
        }
        Ok(MotorCommand{ id, action: MotorAction::Run{ direction, speed } })
    }

    pub fn stop(id: u8) -> Self{
        MotorCommand{ id, action: MotorAction::Stop }
    }

    pub fn encode(&self) -> String{
        match &self.action{
            MotorAction::Run{ direction, speed } => format!("M{} {} {}\n", self.id, direction, speed),
            MotorAction::Stop => format!("M{} STOP\n", self.id),
        }
    }
}

//sensor line: "1:<0|1>,2:<0|1>"
pub fn parse_switch_line(line: &str) -> Result<SwitchState>{
    let malformed = || ControlError::MalformedSwitchLine(line.to_string());

    let mut fields = line.trim().split(',');
    let first = fields.next().ok_or_else(malformed)?;
    let second = fields.next().ok_or_else(malformed)?;
    if fields.next().is_some(){
        return Err(malformed());
    }

    let left = parse_switch_field(first, "1").ok_or_else(malformed)?;
    let right = parse_switch_field(second, "2").ok_or_else(malformed)?;

    Ok(SwitchState{ left, right })
}

fn parse_switch_field(field: &str, key: &str) -> Option<bool>{
    let (k, v) = field.split_once(':')?;
    if k.trim() != key{
        return None;
    }
    match v.trim().parse::<u8>().ok()?{
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_thruster_line_format(){
        assert_eq!(encode_thruster_line(0, 1500), "1:1500\n");
        assert_eq!(encode_thruster_line(7, 1900), "8:1900\n");
    }

    #[test]
    fn test_thruster_frame_order(){
        let pwm = PwmVector::new([1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800]);
        let lines = encode_thruster_frame(&pwm);
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "1:1100\n");
        assert_eq!(lines[7], "8:1800\n");
    }

    #[test]
    fn test_parse_thruster_line(){
        assert_eq!(parse_thruster_line("3:1700\n"), Some((2, 1700)));
        assert_eq!(parse_thruster_line("0:1500"), None);
        assert_eq!(parse_thruster_line("9:1500"), None);
        assert_eq!(parse_thruster_line("garbage"), None);
    }

    #[test]
    fn test_motor_command_encoding(){
        let run = MotorCommand::run(2, "forward", 120).unwrap();
        assert_eq!(run.encode(), "M2 FORWARD 120\n");
        assert_eq!(MotorCommand::stop(1).encode(), "M1 STOP\n");
        assert_eq!(MotorCommand::run(3, "stop", 50).unwrap(), MotorCommand::stop(3));
    }

    #[test]
    fn test_motor_command_rejects_bad_direction(){
        assert!(MotorCommand::run(1, "", 10).is_err());
        assert!(MotorCommand::run(1, "LEFT\nM2 STOP", 10).is_err());
    }

    #[test]
    fn test_parse_switch_line(){
        assert_eq!(parse_switch_line("1:0,2:1").unwrap(), SwitchState{ left: false, right: true });
        assert_eq!(parse_switch_line(" 1: 1 , 2:0\r\n").unwrap(), SwitchState{ left: true, right: false });
    }

    #[test]
    fn test_parse_switch_line_rejects_malformed(){
        for line in ["", "1:0", "1:0,2:", "1:2,2:0", "2:0,1:1", "1:0,2:1,3:0", "hello", "1:x,2:1"]{
            assert!(parse_switch_line(line).is_err(), "accepted {:?}", line);
        }
    }
}
