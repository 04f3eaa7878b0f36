/**
 * AUV Controller Binary
 *
 * Opens the thruster, motor and switch channels, starts the control tasks
 * and turns keyboard commands into joystick events:
 * 1. w/s, a/d, q/e hold surge, sway, heave at full scale
 * 2. auto, left/right/fwd/down press buttons 0 and 4-7
 * 3. pwm, sw, mode, tam show state; m sends a motor command
 *
 * Usage: auv_controller [config.json] [baud]
 */

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bibi_helm::auv::state::lock;
use bibi_helm::auv::DofInputs;
use bibi_helm::{logging, AuvController, ControllerConfig, MotorCommand};

const BUTTON_COUNT: usize = 8;
const REPEAT_INTERVAL: Duration = Duration::from_millis(50);

fn press(controller: &AuvController, axes: DofInputs, button: usize) {
    let mut buttons = vec![0; BUTTON_COUNT];
    buttons[button] = 1;
    if let Err(e) = controller.joystick(axes.surge, axes.sway, axes.heave, &buttons) {
        println!("[ERROR] {}", e);
    }
    // release, so the next press is a new edge
    let _ = controller.joystick(axes.surge, axes.sway, axes.heave, &[0; BUTTON_COUNT]);
}

fn print_tam(controller: &AuvController) {
    for (i, row) in controller.tam().rows().iter().enumerate() {
        println!("  T{}: surge={:>5.2} sway={:>5.2} heave={:>5.2}", i + 1, row[0], row[1], row[2]);
    }
}

fn motor(controller: &AuvController, args: &[&str]) {
    let command = match args {
        [id, dir] if dir.eq_ignore_ascii_case("stop") => id.parse().map(MotorCommand::stop).ok(),
        [id, dir, speed] => match (id.parse(), speed.parse()) {
            (Ok(id), Ok(speed)) => MotorCommand::run(id, dir, speed).ok(),
            _ => None,
        },
        _ => None,
    };
    match command {
        Some(cmd) => match controller.motor_command(&cmd) {
            Ok(reply) => println!("[MOTOR] {}", if reply.is_empty() { "(no reply)" } else { &reply }),
            Err(e) => println!("[ERROR] {}", e),
        },
        None => println!("usage: m <id> <direction> <speed> | m <id> stop"),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match args.get(1) {
        Some(path) => match ControllerConfig::from_path(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => ControllerConfig::default(),
    };
    if let Some(baud) = args.get(2).and_then(|s| s.parse().ok()) {
        config.channels.baud = baud;
    }
    logging::init(config.log_level());

    println!("==============================================");
    println!("  BiBi-Helm AUV Controller");
    println!("==============================================");
    println!("  Thrusters: {}", config.channels.thrusters);
    println!("  Motor:     {}", config.channels.motor);
    println!("  Switches:  {}", config.channels.switches);
    println!("  Baud:      {}", config.channels.baud);
    println!("==============================================\n");

    let controller = match AuvController::open(config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.start() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // joystick UIs stream events; keep re-sending the held axes the same way
    let axes = Arc::new(Mutex::new(DofInputs::NEUTRAL));
    let repeating = Arc::new(AtomicBool::new(true));
    let repeater = {
        let controller = Arc::clone(&controller);
        let axes = Arc::clone(&axes);
        let repeating = Arc::clone(&repeating);
        thread::spawn(move || {
            while repeating.load(Ordering::SeqCst) {
                let a = *lock(&axes);
                let _ = controller.joystick(a.surge, a.sway, a.heave, &[0; BUTTON_COUNT]);
                thread::sleep(REPEAT_INTERVAL);
            }
        })
    };

    println!("[Commands]");
    println!("  w/s - surge forward/backward");
    println!("  a/d - sway left/right");
    println!("  q/e - heave up/down");
    println!("  stop - release the sticks");
    println!("  auto - toggle Auto mode");
    println!("  left/right/fwd/down - toggle semi-auto direction");
    println!("  pwm/sw/mode/tam - show state");
    println!("  m <id> <dir> <speed> | m <id> stop - motor command");
    println!("  x - exit\n");

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let words: Vec<&str> = input.split_whitespace().collect();
        let held = *lock(&axes);

        let set_axes = |a: DofInputs| *lock(&axes) = a;
        match words.as_slice() {
            ["w"] => set_axes(DofInputs::new(1.0, 0.0, 0.0)),
            ["s"] => set_axes(DofInputs::new(-1.0, 0.0, 0.0)),
            ["a"] => set_axes(DofInputs::new(0.0, -1.0, 0.0)),
            ["d"] => set_axes(DofInputs::new(0.0, 1.0, 0.0)),
            ["q"] => set_axes(DofInputs::new(0.0, 0.0, 1.0)),
            ["e"] => set_axes(DofInputs::new(0.0, 0.0, -1.0)),
            ["stop"] => set_axes(DofInputs::NEUTRAL),
            ["auto"] => press(&controller, held, 0),
            ["left"] => press(&controller, held, 4),
            ["right"] => press(&controller, held, 5),
            ["fwd"] => press(&controller, held, 6),
            ["down"] => press(&controller, held, 7),
            ["pwm"] => {
                println!("[CURRENT] {:?}", controller.current_pwm().as_array());
                println!("[TARGET]  {:?}", controller.target_pwm().as_array());
            }
            ["sw"] => {
                let s = controller.switches();
                println!("[SWITCHES] 1={} 2={}", s.left as u8, s.right as u8);
            }
            ["mode"] => println!("[MODE] {}", controller.mode()),
            ["tam"] => print_tam(&controller),
            ["m", rest @ ..] => motor(&controller, rest),
            ["x"] | ["exit"] | ["quit"] => break,
            [] => {}
            _ => println!("Unknown command: {}", input.trim()),
        }
    }

    println!("[SHUTDOWN]");
    repeating.store(false, Ordering::SeqCst);
    let _ = repeater.join();
    controller.shutdown();
    println!("Goodbye!");
}
