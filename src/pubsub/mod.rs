pub mod message;
pub mod topic;
pub mod publisher;
pub mod subscriber;
pub mod registry;

pub use message::Message;
pub use topic::Topic;
pub use publisher::Publisher;
pub use subscriber::Subscriber;
pub use registry::TopicRegistry;

//topic names the control tasks publish on
pub const PWM_TOPIC: &str = "/auv/pwm";
pub const SWITCH_TOPIC: &str = "/auv/switches";
pub const TOPIC_CAPACITY: usize = 32;
