//a slot in the ring buffer containing data and its epoch
struct Slot<T>{
    data: T,
    epoch: u64,  //epoch when this slot was last written, 0 = never
}

//fixed capacity ring with per-slot epochs
//freshness biased: pushing into a full ring discards the oldest entry
//not synchronised itself, owners wrap it in a lock (see pubsub::Topic)
pub struct RingBuffer<T>{
    buffer: Vec<Slot<T>>,
    head: usize,
    tail: usize,
    write_epoch: u64,  //epoch of the newest push
    read_epoch: u64,   //epoch of the newest pop (or discard)
}

impl<T: Clone + Default> RingBuffer<T>{
    pub fn new(capacity: usize) -> Self{
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");

        let buffer = (0..capacity)
            .map(|_| Slot{ data: T::default(), epoch: 0 })
            .collect();

        RingBuffer{
            buffer,
            head: 0,
            tail: 0,
            write_epoch: 0,
            read_epoch: 0,
        }
    }

    //head == tail is ambiguous, the slot epoch tells empty from full
    fn unread(&self, index: usize) -> bool{
        self.buffer[index].epoch > self.read_epoch
    }

    //push item, return its epoch
    pub fn push(&mut self, item: T) -> u64{
        if self.is_full(){
            //discard oldest
            self.read_epoch = self.buffer[self.tail].epoch;
            self.tail = (self.tail + 1) % self.capacity();
        }

        self.write_epoch += 1;
        let slot = &mut self.buffer[self.head];
        slot.data = item;
        slot.epoch = self.write_epoch;

        self.head = (self.head + 1) % self.capacity();
        self.write_epoch
    }

    //pop the oldest item
    pub fn pop(&mut self) -> Option<T>{
        if self.is_empty(){
            return None;
        }

        let slot = &self.buffer[self.tail];
        let item = slot.data.clone();
        self.read_epoch = slot.epoch;
        self.tail = (self.tail + 1) % self.capacity();

        Some(item)
    }

    //newest item, not consumed
    pub fn peek_latest(&self) -> Option<(T, u64)>{
        if self.is_empty(){
            return None;
        }

        let latest = (self.head + self.capacity() - 1) % self.capacity();
        let slot = &self.buffer[latest];
        Some((slot.data.clone(), slot.epoch))
    }

    pub fn len(&self) -> usize{
        if self.head == self.tail{
            if self.unread(self.head){ self.capacity() }else{ 0 }
        }else if self.head > self.tail{
            self.head - self.tail
        }else{
            self.capacity() - self.tail + self.head
        }
    }

    pub fn is_empty(&self) -> bool{
        self.head == self.tail && !self.unread(self.tail)
    }

    pub fn is_full(&self) -> bool{
        self.head == self.tail && self.unread(self.tail)
    }

    pub fn capacity(&self) -> usize{
        self.buffer.len()
    }
}
