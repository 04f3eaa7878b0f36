use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use super::topic::Topic;
use super::message::Message;

//observer handle: tracks which epoch it has seen so it can poll for the
//newest snapshot without consuming entries other observers may want
pub struct Subscriber<T: Message>{
    topic: Arc<Topic<T>>,
    last_seen_epoch: AtomicU64,
}

impl<T: Message> Subscriber<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        Subscriber{
            topic,
            last_seen_epoch: AtomicU64::new(0),
        }
    }

    //newest snapshot if it arrived since the last call
    pub fn latest_if_new(&self) -> Option<T>{
        let (msg, epoch) = self.topic.peek_latest()?;
        let last = self.last_seen_epoch.swap(epoch, Ordering::SeqCst);
        if epoch > last{ Some(msg) }else{ None }
    }
}
