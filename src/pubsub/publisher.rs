use std::sync::Arc;
use super::topic::Topic;
use super::message::Message;

pub struct Publisher<T: Message>{
    topic: Arc<Topic<T>>,
}

impl<T: Message> Publisher<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        Publisher{ topic }
    }

    pub fn publish(&self, msg: T) -> u64{
        self.topic.publish(msg)
    }
}

impl<T: Message> Clone for Publisher<T>{
    fn clone(&self) -> Self{
        Publisher{ topic: Arc::clone(&self.topic) }
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::auv::thrust_mixer::PwmVector;

    #[test]
    fn test_publisher_publish(){
        let topic = Arc::new(Topic::<PwmVector>::new("/auv/pwm", 8));
        let publisher = Publisher::new(Arc::clone(&topic));
        let other = publisher.clone();
        assert_eq!(publisher.publish(PwmVector::NEUTRAL), 1);
        assert_eq!(other.publish(PwmVector::NEUTRAL), 2);
        assert_eq!(topic.len(), 2);
    }
}
