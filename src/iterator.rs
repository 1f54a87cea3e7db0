use crate::{error::Error, error::Result, utils::release::DropRelease};

/// Ordered cursor over key/value pairs. A fresh iterator is invalid until
/// one of the seek methods positions it.
pub trait DBIterator {
    fn valid(&self) -> bool;
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    /// Positions at the first entry with a key `>= target`.
    fn seek(&mut self, target: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    /// Reports (and clears) the first error encountered.
    fn status(&mut self) -> Result<()>;
}

impl<I: DBIterator + ?Sized> DBIterator for Box<I> {
    fn valid(&self) -> bool {
        (**self).valid()
    }
    fn seek_to_first(&mut self) {
        (**self).seek_to_first()
    }
    fn seek_to_last(&mut self) {
        (**self).seek_to_last()
    }
    fn seek(&mut self, target: &[u8]) {
        (**self).seek(target)
    }
    fn next(&mut self) {
        (**self).next()
    }
    fn prev(&mut self) {
        (**self).prev()
    }
    fn key(&self) -> &[u8] {
        (**self).key()
    }
    fn value(&self) -> &[u8] {
        (**self).value()
    }
    fn status(&mut self) -> Result<()> {
        (**self).status()
    }
}

/// Iterator over nothing, optionally carrying an error for `status`.
#[derive(Default)]
pub struct EmptyIterator {
    err: Option<Error>,
}

impl EmptyIterator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(err: Error) -> Self {
        EmptyIterator { err: Some(err) }
    }
}

impl DBIterator for EmptyIterator {
    fn valid(&self) -> bool {
        false
    }
    fn seek_to_first(&mut self) {}
    fn seek_to_last(&mut self) {}
    fn seek(&mut self, _target: &[u8]) {}
    fn next(&mut self) {
        panic!("next on an invalid iterator");
    }
    fn prev(&mut self) {
        panic!("prev on an invalid iterator");
    }
    fn key(&self) -> &[u8] {
        panic!("key on an invalid iterator");
    }
    fn value(&self) -> &[u8] {
        panic!("value on an invalid iterator");
    }
    fn status(&mut self) -> Result<()> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

type Cleanup = DropRelease<Box<dyn FnOnce()>>;

/// Forwards to an inner iterator and runs the registered cleanups exactly
/// once, when it is dropped.
pub struct CleanupIterator<I: DBIterator> {
    // declared first so the inner iterator is gone before cleanups run
    inner: I,
    cleanups: Vec<Cleanup>,
}

impl<I: DBIterator> CleanupIterator<I> {
    pub fn new(inner: I) -> Self {
        CleanupIterator {
            inner,
            cleanups: Vec::new(),
        }
    }

    pub fn register_cleanup<F: FnOnce() + 'static>(&mut self, func: F) {
        let func: Box<dyn FnOnce()> = Box::new(func);
        self.cleanups.push(DropRelease::new(func));
    }
}

impl<I: DBIterator> DBIterator for CleanupIterator<I> {
    fn valid(&self) -> bool {
        self.inner.valid()
    }
    fn seek_to_first(&mut self) {
        self.inner.seek_to_first()
    }
    fn seek_to_last(&mut self) {
        self.inner.seek_to_last()
    }
    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target)
    }
    fn next(&mut self) {
        self.inner.next()
    }
    fn prev(&mut self) {
        self.inner.prev()
    }
    fn key(&self) -> &[u8] {
        self.inner.key()
    }
    fn value(&self) -> &[u8] {
        self.inner.value()
    }
    fn status(&mut self) -> Result<()> {
        self.inner.status()
    }
}
