//! 结构事件的订阅与分发。
//!
//! 订阅按注册顺序投递；可带事件类型过滤，也可随时退订。

use std::sync::Arc;

use crate::constant::{Direction, EventType, FractalType, Freq};
use crate::id_generator::IdGenerator;

/// 事件涉及的结构。
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    MergedBar(u64),
    Fractal {
        id: u64,
        fractal_type: FractalType,
    },
    Stroke {
        id: u64,
        direction: Direction,
        /// 封存前恒为一级。
        level: u8,
    },
    Pivot(u64),
    /// 被拒绝的 bar 及原因。
    Rejected(String),
}

impl Subject {
    pub fn structure_id(&self) -> Option<u64> {
        match self {
            Self::MergedBar(id) | Self::Pivot(id) => Some(*id),
            Self::Fractal { id, .. } | Self::Stroke { id, .. } => Some(*id),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub freq: Freq,
    pub kind: EventType,
    /// 引发该事件的原始 bar。
    pub bar_id: u64,
    pub subject: Subject,
}

pub type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    filter: Option<EventType>,
    subscriber: Subscriber,
}

impl Subscription {
    fn accepts(&self, kind: EventType) -> bool {
        self.filter.is_none_or(|x| x == kind)
    }
}

pub struct EventBus {
    subscriptions: Vec<Subscription>,
    id_generator: IdGenerator,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            id_generator: IdGenerator::new(),
        }
    }

    /// `filter` 为 `None` 时接收全部事件。
    pub fn subscribe(&mut self, filter: Option<EventType>, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.id_generator.get_id());
        self.subscriptions.push(Subscription {
            id,
            filter,
            subscriber,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|x| x.id != id);
        self.subscriptions.len() != before
    }

    /// 返回收到该事件的订阅数。
    pub fn publish(&self, event: &Event) -> usize {
        let mut delivered = 0;
        for subscription in self.subscriptions.iter().filter(|x| x.accepts(event.kind)) {
            (subscription.subscriber)(event);
            delivered += 1;
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn event(kind: EventType, subject: Subject) -> Event {
        Event {
            freq: Freq::F5,
            kind,
            bar_id: 1,
            subject,
        }
    }

    #[test]
    fn filtered_and_catch_all_subscribers_share_one_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&log);
        bus.subscribe(
            Some(EventType::PivotSealed),
            Arc::new(move |_: &Event| sink.lock().unwrap().push("pivot")),
        );
        let sink = Arc::clone(&log);
        let all = bus.subscribe(None, Arc::new(move |_: &Event| sink.lock().unwrap().push("all")));

        assert_eq!(bus.publish(&event(EventType::PivotSealed, Subject::Pivot(4))), 2);
        assert_eq!(bus.publish(&event(EventType::BarMerged, Subject::MergedBar(9))), 1);
        assert_eq!(*log.lock().unwrap(), vec!["pivot", "all", "all"]);

        assert!(bus.unsubscribe(all));
        assert!(!bus.unsubscribe(all));
        assert_eq!(bus.publish(&event(EventType::BarMerged, Subject::MergedBar(10))), 0);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn rejected_bars_carry_no_structure_id() {
        assert_eq!(Subject::Rejected("bad".to_string()).structure_id(), None);
        let stroke = Subject::Stroke {
            id: 3,
            direction: Direction::Up,
            level: 1,
        };
        assert_eq!(stroke.structure_id(), Some(3));
    }
}
