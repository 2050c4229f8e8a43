use super::*;

impl Engine {
    /// Fires every task due at the clock's current time. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        let fired = self.pump();
        if fired > 0 {
            self.persist();
        }
        fired
    }

    /// Fires everything outstanding, in order, regardless of the clock. Used
    /// by non-interactive drivers that do not wait for real time.
    pub fn flush(&mut self) -> usize {
        let mut fired = 0usize;
        while fired < FLUSH_GUARD {
            let Some((fire_at, task)) = self.scheduler.pop_next() else {
                break;
            };
            self.fire(fire_at, task);
            fired += 1;
        }
        if fired >= FLUSH_GUARD {
            tracing::warn!(remaining = self.scheduler.len(), "flush stopped at guard limit");
        }
        if fired > 0 {
            self.persist();
        }
        fired
    }

    pub(super) fn pump(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0usize;
        while let Some((fire_at, task)) = self.scheduler.pop_due(now) {
            self.fire(fire_at, task);
            fired += 1;
        }
        fired
    }

    pub(super) fn schedule_task(&mut self, contact: &str, fire_at: u64, task: Delivery) -> u64 {
        self.scheduler.schedule(
            fire_at,
            ScheduledTask {
                contact: contact.to_string(),
                epoch: self.epoch,
                task,
            },
        )
    }

    fn fire(&mut self, fire_at: u64, scheduled: ScheduledTask) {
        if scheduled.epoch != self.epoch {
            tracing::warn!(
                contact = scheduled.contact.as_str(),
                task_epoch = scheduled.epoch,
                epoch = self.epoch,
                "dropping stale task"
            );
            return;
        }
        let contact = scheduled.contact;
        match scheduled.task {
            Delivery::Typing => self.show_typing(&contact, fire_at),
            Delivery::Reply { text } => {
                self.append_message(&contact, text, MessageKind::Text, fire_at);
            }
            Delivery::Payload { action } => self.run_action(&contact, &action, fire_at),
            Delivery::Notices => self.deliver_notices(&contact, fire_at),
        }
    }

    /// Makes `key` the contact's current round and delivers it: the body is
    /// evaluated against the live variables, its `(set:)` assignments are
    /// applied, its actions (after `leading`, the choice's embedded action)
    /// run, and its text goes out as the reply.
    pub(super) fn enter_round(
        &mut self,
        contact: &str,
        key: RoundKey,
        now: u64,
        pacing: Pacing,
        leading: Option<Action>,
    ) {
        let Some(round) = self
            .data
            .contact(contact)
            .and_then(|entry| entry.round(&key))
            .cloned()
        else {
            tracing::warn!(contact, round = %key, "round missing; nothing delivered");
            return;
        };

        let evaluation = self.evaluate_round(&round);
        self.state.current_rounds.insert(contact.to_string(), key);
        for (name, value) in evaluation.assignments {
            self.assign_variable(name, value, now);
        }

        let actions = leading.into_iter().chain(evaluation.actions).collect::<Vec<_>>();
        let plan = self.plan_actions(contact, &actions, now);
        tracing::debug!(contact, round = %key, ?pacing, "entering round");
        self.schedule_sequence(contact, evaluation.text, plan, now, pacing);
    }

    pub(super) fn evaluate_round(&self, round: &Round) -> Evaluation {
        let mut scratch = self.state.variables.clone();
        evaluate_body(&round.body, &mut scratch)
    }

    /// Lays out one reply sequence on the timeline:
    /// typing at `now + G`, reply at `now + G + indicator` (or `now` when
    /// `G == 0`), each payload at `reply_at + delay`, then the notices task
    /// after the last of them.
    pub(super) fn schedule_sequence(
        &mut self,
        contact: &str,
        text: String,
        plan: ActionPlan,
        now: u64,
        pacing: Pacing,
    ) {
        let typing_delay = self.state.global_typing_delay;
        let reply_at = match pacing {
            Pacing::Immediate => {
                if !text.is_empty() {
                    self.append_message(contact, text, MessageKind::Text, now);
                }
                now
            }
            Pacing::Typed => {
                let reply_at = if typing_delay > 0 {
                    self.schedule_task(contact, now + typing_delay, Delivery::Typing);
                    now + typing_delay + self.typing_indicator_ms
                } else {
                    now
                };
                if !text.is_empty() {
                    self.schedule_task(contact, reply_at, Delivery::Reply { text });
                }
                reply_at
            }
        };

        let mut last = reply_at;
        for action in plan.payloads {
            let fire_at = reply_at + action.delay;
            last = last.max(self.schedule_task(contact, fire_at, Delivery::Payload { action }));
        }
        if let Some(deferred_delay) = plan.deferred_delay {
            last = last.max(reply_at + deferred_delay);
        }

        let has_pending = self.state.pending_unlocks.contains_key(contact)
            || self.state.pending_end.contains(contact);
        if has_pending {
            self.schedule_task(contact, last, Delivery::Notices);
        }
    }

    /// Unlock notices first, then the end notice, so an ended thread's last
    /// message is always the end notice.
    fn deliver_notices(&mut self, contact: &str, at: u64) {
        let unlocks = self.state.pending_unlocks.remove(contact).unwrap_or_default();
        for target in unlocks {
            self.unlock_contact(contact, &target, at);
        }
        if self.state.pending_end.remove(contact) && self.end_thread(contact, at) {
            self.publish(EngineEvent::ActionExecuted {
                contact: contact.to_string(),
                action: Action::new(ActionKind::EndThread),
            });
        }
    }

    fn unlock_contact(&mut self, source: &str, target: &str, at: u64) {
        let Some(first) = self.data.contact(target).map(|entry| entry.first_round_key()) else {
            tracing::warn!(source, target, "unlock_contact names an unknown contact");
            return;
        };
        // Only a locked thread opens here; an ended one comes back solely
        // through a satisfied conditional round.
        if self.state.unlocked_contacts.contains(target)
            && self.state.thread_state(target) != Some(ThreadState::Locked)
        {
            tracing::debug!(target, state = ?self.state.thread_state(target), "unlock skipped");
            return;
        }

        self.append_message(
            source,
            ts_core::unlock_notice(target),
            MessageKind::UnlockContact,
            at,
        );
        self.mark_unlocked(target);
        self.set_thread(target, ThreadState::Active);
        self.publish(EngineEvent::ActionExecuted {
            contact: source.to_string(),
            action: Action::new(ActionKind::UnlockContact {
                contact: target.to_string(),
            }),
        });
        match first {
            Some(key) => self.enter_round(target, key, at, Pacing::Immediate, None),
            None => tracing::warn!(target, "unlocked contact has no rounds"),
        }
    }

    /// Appends the end notice and ends the thread. Returns `false` when it
    /// had already ended.
    pub(super) fn end_thread(&mut self, contact: &str, at: u64) -> bool {
        if self.state.thread_state(contact) == Some(ThreadState::Ended) {
            return false;
        }
        self.append_message(
            contact,
            END_THREAD_NOTICE.to_string(),
            MessageKind::EndThread,
            at,
        );
        self.set_thread(contact, ThreadState::Ended);
        true
    }

    pub(super) fn mark_unlocked(&mut self, contact: &str) {
        if self.state.unlocked_contacts.insert(contact.to_string()) {
            self.publish(EngineEvent::ContactUnlocked {
                contact: contact.to_string(),
            });
        }
    }

    pub(super) fn set_thread(&mut self, contact: &str, thread: ThreadState) {
        let previous = self.state.threads.insert(contact.to_string(), thread);
        if previous != Some(thread) {
            tracing::debug!(contact, ?thread, "thread state changed");
            self.publish(EngineEvent::ThreadStateChanged {
                contact: contact.to_string(),
                state: thread,
            });
        }
    }

    pub(super) fn append_message(
        &mut self,
        contact: &str,
        text: String,
        kind: MessageKind,
        at: u64,
    ) -> Message {
        self.push_message(contact, text, kind, at, false, None, None)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn push_message(
        &mut self,
        contact: &str,
        text: String,
        kind: MessageKind,
        at: u64,
        from_player: bool,
        media: Option<String>,
        location: Option<LocationPin>,
    ) -> Message {
        let message = Message {
            id: self.state.allocate_message_id(contact),
            contact: contact.to_string(),
            text,
            timestamp: at,
            from_player,
            kind,
            media,
            location,
            read: from_player,
        };
        self.state
            .messages
            .entry(contact.to_string())
            .or_default()
            .push(message.clone());
        self.publish(EngineEvent::MessageAdded {
            message: message.clone(),
        });
        message
    }

    /// Typing bubbles are announced but never stored in history.
    pub(super) fn show_typing(&mut self, contact: &str, at: u64) {
        let message = Message {
            id: format!("{}-typing-{}", contact, at),
            contact: contact.to_string(),
            text: String::new(),
            timestamp: at,
            from_player: false,
            kind: MessageKind::Typing,
            media: None,
            location: None,
            read: true,
        };
        self.publish(EngineEvent::MessageAdded { message });
    }
}
