/// Multicast to a group's members.
///
/// Every variant snapshots the recipient handles under the membership read
/// lock and dispatches with no group or registry lock held. Per-user delivery
/// goes through the room, which walks that user's connections in the room.
///
/// Exclusion fails open: excluding a user or connection that is not part of
/// the group delivers to everyone.
use std::ops::AddAssign;
use std::sync::Arc;

use serde::Serialize;

use crate::connection::Connection;
use crate::error::GroupError;
use crate::group::Group;
use crate::room::Room;
use crate::types::{ConnectionId, Frame, MessageType};
use crate::user::User;

/// Outcome of one fanout call, counted per connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

impl AddAssign for FanoutReport {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

impl Group {
    // ── Single recipient ─────────────────────────────────────────────────

    /// Send one frame to one connection.
    pub fn notify(&self, conn: &dyn Connection, frame: &Frame) -> FanoutReport {
        let report = match conn.send(frame) {
            Ok(()) => FanoutReport {
                delivered: 1,
                failed: 0,
            },
            Err(e) => {
                tracing::debug!(group = %self.id(), "notify failed: {e}");
                FanoutReport {
                    delivered: 0,
                    failed: 1,
                }
            }
        };
        self.finish("notify", report)
    }

    pub fn notify_encoded<T: Serialize + ?Sized>(
        &self,
        conn: &dyn Connection,
        value: &T,
        kind: MessageType,
    ) -> Result<FanoutReport, GroupError> {
        let frame = self.codec().encode(value, kind)?;
        Ok(self.notify(conn, &frame))
    }

    /// Send one frame to every connection `user` holds inside `room`.
    pub fn notify_user(&self, user: &User, room: &dyn Room, frame: &Frame) -> FanoutReport {
        let report = room.notify(user, frame);
        self.finish("notify_user", report)
    }

    pub fn notify_user_encoded<T: Serialize + ?Sized>(
        &self,
        user: &User,
        room: &dyn Room,
        value: &T,
        kind: MessageType,
    ) -> Result<FanoutReport, GroupError> {
        let frame = self.codec().encode(value, kind)?;
        Ok(self.notify_user(user, room, &frame))
    }

    // ── Everyone ─────────────────────────────────────────────────────────

    /// Send one frame to every member's connections inside `room`.
    pub fn notify_all(&self, room: &dyn Room, frame: &Frame) -> FanoutReport {
        let recipients = self.members();
        let report = deliver(recipients.iter(), room, frame);
        self.finish("notify_all", report)
    }

    pub fn notify_all_encoded<T: Serialize + ?Sized>(
        &self,
        room: &dyn Room,
        value: &T,
        kind: MessageType,
    ) -> Result<FanoutReport, GroupError> {
        let frame = self.codec().encode(value, kind)?;
        Ok(self.notify_all(room, &frame))
    }

    // ── Everyone but one user ────────────────────────────────────────────

    /// Send to every member except the one whose stored handle is `user`.
    ///
    /// Comparison is by handle identity, not by id: a different `User`
    /// object carrying the same id is not excluded.
    pub fn notify_all_except(
        &self,
        user: &Arc<User>,
        room: &dyn Room,
        frame: &Frame,
    ) -> FanoutReport {
        let recipients = self.members();
        let report = deliver(
            recipients.iter().filter(|m| !Arc::ptr_eq(*m, user)),
            room,
            frame,
        );
        self.finish("notify_all_except", report)
    }

    pub fn notify_all_except_encoded<T: Serialize + ?Sized>(
        &self,
        user: &Arc<User>,
        room: &dyn Room,
        value: &T,
        kind: MessageType,
    ) -> Result<FanoutReport, GroupError> {
        let frame = self.codec().encode(value, kind)?;
        Ok(self.notify_all_except(user, room, &frame))
    }

    // ── Everyone but one connection ──────────────────────────────────────

    /// Send to every member's connections inside `room` except `conn`.
    ///
    /// The owner of `conn` is resolved through the room. Other members get
    /// the frame on all their connections; the owner gets it on its other
    /// connections in this room, whether or not it is a member. If `conn`
    /// resolves to no user, every member receives the frame.
    pub fn notify_all_except_connection(
        &self,
        conn: &ConnectionId,
        room: &dyn Room,
        frame: &Frame,
    ) -> FanoutReport {
        let recipients = self.members();
        let Some(owner) = room.resolve_user(conn) else {
            let report = deliver(recipients.iter(), room, frame);
            return self.finish("notify_all_except_connection", report);
        };

        let others = recipients.iter().filter(|m| !Arc::ptr_eq(*m, &owner));
        let mut report = deliver(others, room, frame);
        report += owner.deliver(room.id(), frame, Some(conn));
        self.finish("notify_all_except_connection", report)
    }

    pub fn notify_all_except_connection_encoded<T: Serialize + ?Sized>(
        &self,
        conn: &ConnectionId,
        room: &dyn Room,
        value: &T,
        kind: MessageType,
    ) -> Result<FanoutReport, GroupError> {
        let frame = self.codec().encode(value, kind)?;
        Ok(self.notify_all_except_connection(conn, room, &frame))
    }

    fn finish(&self, op: &'static str, report: FanoutReport) -> FanoutReport {
        if let Some(registry) = self.registry() {
            registry.stats.frames(report.delivered, report.failed);
        }
        if report.failed > 0 {
            tracing::warn!(
                group = %self.id(),
                op,
                delivered = report.delivered,
                failed = report.failed,
                "fanout had failed sends"
            );
        } else {
            tracing::debug!(group = %self.id(), op, delivered = report.delivered, "fanout");
        }
        report
    }
}

fn deliver<'a>(
    recipients: impl Iterator<Item = &'a Arc<User>>,
    room: &dyn Room,
    frame: &Frame,
) -> FanoutReport {
    let mut report = FanoutReport::default();
    for user in recipients {
        report += room.notify(user, frame);
    }
    report
}
