use std::sync::Mutex;
use crate::auv::state::lock;
use crate::ring_buffer::RingBuffer;
use super::message::Message;

//named, bounded, freshness-biased channel of snapshots
//slow observers lose the oldest entries, never block the publisher
pub struct Topic<T: Message>{
    name: String,
    buffer: Mutex<RingBuffer<T>>,
}

impl<T: Message> Topic<T>{
    pub fn new(name: &str, capacity: usize) -> Self{
        Topic{
            name: name.to_string(),
            buffer: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn name(&self) -> &str{
        &self.name
    }

    pub fn publish(&self, msg: T) -> u64{
        lock(&self.buffer).push(msg)
    }

    pub fn try_receive(&self) -> Option<T>{
        lock(&self.buffer).pop()
    }

    pub fn peek_latest(&self) -> Option<(T, u64)>{
        lock(&self.buffer).peek_latest()
    }

    pub fn len(&self) -> usize{
        lock(&self.buffer).len()
    }

    pub fn is_empty(&self) -> bool{
        lock(&self.buffer).is_empty()
    }

    pub fn capacity(&self) -> usize{
        lock(&self.buffer).capacity()
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::auv::state::SwitchState;
    use crate::auv::thrust_mixer::PwmVector;

    #[test]
    fn test_typed_topic_publish_receive(){
        let topic: Topic<SwitchState> = Topic::new("/auv/switches", 8);
        let closed = SwitchState{ left: true, right: false };
        let e1 = topic.publish(SwitchState::default());
        let e2 = topic.publish(closed);
        assert_eq!(e1, 1);
        assert_eq!(e2, 2);
        assert_eq!(topic.len(), 2);
        assert_eq!(topic.name(), "/auv/switches");
        assert_eq!(topic.try_receive(), Some(SwitchState::default()));
        assert_eq!(topic.try_receive(), Some(closed));
        assert!(topic.try_receive().is_none());
    }

    #[test]
    fn test_topic_peek_latest(){
        let topic: Topic<PwmVector> = Topic::new("/auv/pwm", 4);
        topic.publish(PwmVector::NEUTRAL);
        topic.publish(PwmVector::new([1508; 8]));
        let (val, epoch) = topic.peek_latest().unwrap();
        assert_eq!(val, PwmVector::new([1508; 8]));
        assert_eq!(epoch, 2);
        assert_eq!(topic.len(), 2);
    }

    #[test]
    fn test_topic_keeps_newest_when_full(){
        let topic: Topic<i32> = Topic::new("/ticks", 2);
        for i in 0..10{
            topic.publish(i);
        }
        assert_eq!(topic.len(), 2);
        assert_eq!(topic.capacity(), 2);
        assert_eq!(topic.try_receive(), Some(8));
        assert_eq!(topic.try_receive(), Some(9));
        assert!(topic.is_empty());
    }
}
