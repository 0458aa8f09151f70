use crate::schema::Token;

/// LIFO queue of tokens whose refresh attempt failed.
///
/// Drained most-recent-first once the sweep is over. A token that
/// fails again while draining is pushed back on top, so it is retried
/// immediately; there is no per-item retry cap, the run watchdog
/// bounds the loop instead. Whatever is left when a run ends is
/// discarded with the run; the next run starts from a clean sweep
/// anyway.
#[derive(Debug, Default)]
pub struct RetryQueue {
    items: Vec<Token>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, token: Token) {
        self.items.push(token);
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: u64) -> Token {
        Token {
            id,
            contract: "0xabc".to_string(),
        }
    }

    #[test]
    fn pops_most_recent_first() {
        let mut queue = RetryQueue::new();
        queue.push(token(1));
        queue.push(token(2));
        queue.push(token(3));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop().map(|t| t.id), Some(3));
        assert_eq!(queue.pop().map(|t| t.id), Some(2));
        assert_eq!(queue.pop().map(|t| t.id), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn repushed_token_is_retried_next() {
        let mut queue = RetryQueue::new();
        queue.push(token(1));
        queue.push(token(2));

        // 2 comes out first, fails again, goes back on top
        let again = queue.pop().expect("queue is not empty");
        assert_eq!(again.id, 2);
        queue.push(again);

        assert_eq!(queue.pop().map(|t| t.id), Some(2));
        assert_eq!(queue.pop().map(|t| t.id), Some(1));
        assert!(queue.is_empty());
    }
}
