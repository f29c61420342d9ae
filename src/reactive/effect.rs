//! Eager observers that re-run when what they read changes.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{self, Freshness, NodeId, Scheduled, Source, Subscriber};

struct EffectInner {
    id: NodeId,
    this: Weak<EffectInner>,
    body: RefCell<Box<dyn FnMut()>>,
    freshness: Flag<Freshness>,
    sources: RefCell<Vec<Rc<dyn Source>>>,
    runs: Flag<u64>,
}

impl EffectInner {
    fn run(&self) {
        let previous_sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in &previous_sources {
            source.unsubscribe(self.id);
        }
        // A write to something the body already read marks the effect stale
        // again; the batch defers that re-run until the body has returned.
        self.freshness.set(Freshness::Clean);
        runtime::batch(|| {
            let subscriber: Weak<dyn Subscriber> = self.this.clone();
            let ((), sources) = runtime::evaluate(subscriber, || {
                let mut body = self.body.borrow_mut();
                (&mut **body)()
            });
            *self.sources.borrow_mut() = sources;
            self.runs.set(self.runs.get() + 1);
        });
    }
}

impl Subscriber for EffectInner {
    fn id(&self) -> NodeId {
        self.id
    }

    fn mark(&self, freshness: Freshness) {
        let previous = self.freshness.get();
        if freshness > previous {
            self.freshness.set(freshness);
        }
        if previous == Freshness::Clean {
            let scheduled: Weak<dyn Scheduled> = self.this.clone();
            runtime::schedule(scheduled);
        }
    }
}

impl Scheduled for EffectInner {
    fn run_if_stale(&self) {
        if self.freshness.get() == Freshness::Check {
            let sources = self.sources.borrow().clone();
            for source in sources {
                // The body meets the cycle itself when it reads the source.
                if source.refresh().is_err() {
                    self.freshness.set(Freshness::Dirty);
                }
                if self.freshness.get() == Freshness::Dirty {
                    break;
                }
            }
        }
        match self.freshness.get() {
            Freshness::Clean => {}
            Freshness::Check => self.freshness.set(Freshness::Clean),
            Freshness::Dirty => self.run(),
        }
    }
}

/// Runs `body` now and again after every flush in which something it read
/// changed value. Dropping the handle stops it.
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("runs", &self.inner.runs.get())
            .finish()
    }
}

impl Effect {
    pub fn new(body: impl FnMut() + 'static) -> Self {
        let inner = Rc::new_cyclic(|this| EffectInner {
            id: runtime::next_node_id(),
            this: this.clone(),
            body: RefCell::new(Box::new(body)),
            freshness: Flag::new(Freshness::Dirty),
            sources: RefCell::new(Vec::new()),
            runs: Flag::new(0),
        });
        inner.run();
        Self { inner }
    }

    /// How many times the body has run, including the initial run.
    pub fn runs(&self) -> u64 {
        self.inner.runs.get()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        for source in self.inner.sources.borrow().iter() {
            source.unsubscribe(self.inner.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, Cell, Derived};

    #[test]
    fn reruns_on_change_only() {
        let name = Cell::new("a".to_string());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let effect = {
            let (name, seen) = (name.clone(), Rc::clone(&seen));
            Effect::new(move || seen.borrow_mut().push(name.get()))
        };
        name.set("a".to_string());
        name.set("b".to_string());
        assert_eq!(*seen.borrow(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(effect.runs(), 2);
    }

    #[test]
    fn batch_delivers_each_effect_once_with_final_values() {
        let cells: Vec<Cell<i32>> = (0..4).map(|_| Cell::new(0)).collect();
        let total = {
            let cells = cells.clone();
            Derived::new(move || cells.iter().map(Cell::get).sum::<i32>())
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let effect = {
            let (total, seen) = (total.clone(), Rc::clone(&seen));
            Effect::new(move || seen.borrow_mut().push(total.get()))
        };

        batch(|| {
            for (i, cell) in cells.iter().enumerate() {
                cell.set(i as i32 + 1);
            }
        });
        assert_eq!(*seen.borrow(), vec![0, 10]);
        assert_eq!(effect.runs(), 2);
        assert_eq!(total.recomputations(), 2);

        for cell in &cells {
            cell.update(|v| *v += 1);
        }
        assert_eq!(effect.runs(), 6);
    }

    #[test]
    fn nested_batches_flush_at_outermost() {
        let a = Cell::new(0);
        let effect = {
            let a = a.clone();
            Effect::new(move || {
                a.get();
            })
        };
        batch(|| {
            a.set(1);
            batch(|| a.set(2));
            assert_eq!(effect.runs(), 1);
            a.set(3);
        });
        assert_eq!(effect.runs(), 2);
    }

    #[test]
    fn dropped_effect_stops() {
        let a = Cell::new(0);
        let effect = {
            let a = a.clone();
            Effect::new(move || {
                a.get();
            })
        };
        assert_eq!(a.subscriber_count(), 1);
        drop(effect);
        assert_eq!(a.subscriber_count(), 0);
        a.set(1);
    }

    #[test]
    fn effect_may_write_cells() {
        let source = Cell::new(1);
        let mirror = Cell::new(0);
        let _effect = {
            let (source, mirror) = (source.clone(), mirror.clone());
            Effect::new(move || {
                mirror.set(source.get() * 100);
            })
        };
        assert_eq!(mirror.get_untracked(), 100);
        source.set(2);
        assert_eq!(mirror.get_untracked(), 200);
    }

    #[test]
    fn writing_a_read_cell_reruns_until_settled() {
        let count = Cell::new(0);
        let effect = {
            let count = count.clone();
            Effect::new(move || {
                let n = count.get();
                if n < 3 {
                    count.set(n + 1);
                }
            })
        };
        assert_eq!(count.get_untracked(), 3);
        assert_eq!(effect.runs(), 4);

        count.set(0);
        assert_eq!(count.get_untracked(), 3);
        assert_eq!(effect.runs(), 8);
    }
}
