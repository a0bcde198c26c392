use crate::protocol::ClientFrame;

/// Tracks the one room the connection is subscribed to.
///
/// Transitions are optimistic: `subscribed` moves as soon as the frames are handed to the
/// transport, without waiting for the server.
#[derive(Debug, Default)]
pub(crate) struct RoomMembership {
    subscribed: Option<String>,
}

impl RoomMembership {
    pub(crate) fn subscribed(&self) -> Option<&str> {
        self.subscribed.as_deref()
    }

    /// Frames to move the subscription to `next`, in send order: leave before join.
    pub(crate) fn transition(&mut self, next: Option<&str>) -> Vec<ClientFrame> {
        if self.subscribed.as_deref() == next {
            return vec![];
        }
        let mut frames = Vec::with_capacity(2);
        if let Some(prev) = self.subscribed.take() {
            frames.push(ClientFrame::Leave { room_id: prev });
        }
        if let Some(room_id) = next {
            frames.push(ClientFrame::Join {
                room_id: room_id.to_string(),
            });
            self.subscribed = Some(room_id.to_string());
        }
        frames
    }

    /// After a (re)connect nothing is joined server-side; join `active` again.
    pub(crate) fn rejoin(&mut self, active: Option<&str>) -> Vec<ClientFrame> {
        self.subscribed = None;
        self.transition(active)
    }

    /// Connection gone: server-side membership ended with it.
    pub(crate) fn reset(&mut self) {
        self.subscribed = None;
    }
}
