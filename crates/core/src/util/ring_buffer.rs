/// Fixed-capacity index-based ring. Pushing onto a full ring evicts the
/// oldest entry; iteration runs oldest to newest. Backs the classifier's
/// anti-repetition label history.
#[derive(Clone, Debug)]
pub struct Ring<T> {
    buf: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `value`, returning the evicted oldest entry when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let cap = self.capacity();
        let tail = (self.head + self.len) % cap;

        if self.len < cap {
            self.buf[tail] = Some(value);
            self.len += 1;
            None
        } else {
            let evicted = self.buf[self.head].replace(value);
            self.head = (self.head + 1) % cap;
            evicted
        }
    }

    /// Most recently pushed entry.
    pub fn last(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let cap = self.capacity();
        let idx = (self.head + self.len - 1) % cap;
        self.buf[idx].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let cap = self.capacity();
        (0..self.len).filter_map(move |i| self.buf[(self.head + i) % cap].as_ref())
    }
}

impl<T: PartialEq> Ring<T> {
    /// Occurrences of `value` anywhere in the ring.
    pub fn count_of(&self, value: &T) -> usize {
        self.iter().filter(|v| *v == value).count()
    }
}
