//! The capacity-1 rendezvous handoff used to exchange padding snapshots
//! between two patch workers.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::SimError;
use crate::geometry::Rectangle;
use crate::person::{Person, PersonContext};

/// One ordered list of persons handed off between a writer and a reader
/// patch. Context is reset to a neutral value before the handoff and
/// re-bound by the reader to its own patch; see [`Person::rebind`].
pub type Snapshot<P> = Vec<P>;

/// A capacity-1 channel: `write` blocks while a value is still pending,
/// `read` blocks while empty. Built directly on `crossbeam_channel::bounded(1)`,
/// whose send/recv semantics already match this contract exactly.
pub struct PaddingChannel<P: Person> {
    area: Rectangle,
    sender: Sender<Snapshot<P>>,
    receiver: Receiver<Snapshot<P>>,
}

impl<P: Person> PaddingChannel<P> {
    pub fn new(area: Rectangle) -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            area,
            sender,
            receiver,
        }
    }

    pub fn area(&self) -> Rectangle {
        self.area
    }

    /// Reset every person's context to neutral, then hand the snapshot off.
    /// Blocks until the previous snapshot (if any) has been consumed.
    pub fn write(
        &self,
        mut snapshot: Snapshot<P>,
        neutral_context: &P::Context,
        patch_id: usize,
    ) -> Result<(), SimError> {
        for person in &mut snapshot {
            person.rebind(neutral_context);
        }
        self.sender
            .send(snapshot)
            .map_err(|_| SimError::WorkerInterrupted { patch_id })
    }

    /// Blocks until a snapshot arrives, then re-binds every person to this
    /// patch's context.
    pub fn read(&self, own_context: &P::Context, patch_id: usize) -> Result<Snapshot<P>, SimError> {
        let mut snapshot = self
            .receiver
            .recv()
            .map_err(|_| SimError::WorkerInterrupted { patch_id })?;
        for person in &mut snapshot {
            person.rebind(own_context);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::XY;
    use crate::person::test_support::{CounterContext, CounterPerson};

    #[test]
    fn write_then_read_roundtrips_and_rebinds() {
        let area = Rectangle::new(XY::new(0, 0), XY::new(2, 2));
        let channel: PaddingChannel<CounterPerson> = PaddingChannel::new(area);

        let neutral = CounterContext(0);
        let owner = CounterContext(7);
        let people = vec![CounterPerson::new(1, XY::new(0, 0), 99)];

        channel.write(people, &neutral, 0).unwrap();
        let received = channel.read(&owner, 1).unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].context_tag(), 7);
    }

    #[test]
    fn read_on_disconnected_channel_is_worker_interrupted() {
        let area = Rectangle::new(XY::new(0, 0), XY::new(1, 1));
        let channel: PaddingChannel<CounterPerson> = PaddingChannel::new(area);
        drop(channel.sender);
        let owner = CounterContext(0);
        let err = channel.read(&owner, 3);
        assert!(matches!(err, Err(SimError::WorkerInterrupted { patch_id: 3 })));
    }
}
