/// Runs a release action exactly once, when the guard is dropped.
pub struct DropRelease<T: FnOnce()> {
    func: Option<T>,
}

impl<T: FnOnce()> Drop for DropRelease<T> {
    fn drop(&mut self) {
        if let Some(func) = self.func.take() {
            func();
        }
    }
}

impl<T: FnOnce()> DropRelease<T> {
    pub fn new(func: T) -> Self {
        DropRelease { func: Some(func) }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_release_runs_once_on_drop() {
        let count = Cell::new(0);
        {
            let _guard = DropRelease::new(|| count.set(count.get() + 1));
            assert_eq!(count.get(), 0);
        }
        assert_eq!(count.get(), 1);
    }
}
