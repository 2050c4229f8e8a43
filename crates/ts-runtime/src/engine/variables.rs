use super::*;

impl Engine {
    /// Sets a runtime variable. Conditional rounds that become satisfied may
    /// reopen locked or ended threads.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        let now = self.clock.now();
        self.assign_variable(name.into(), value, now);
        self.pump();
        self.persist();
    }

    pub fn set_global_typing_delay(&mut self, millis: u64) {
        self.state.global_typing_delay = millis;
        self.persist();
    }

    pub(super) fn assign_variable(&mut self, name: String, value: Value, at: u64) {
        if self.state.variables.get(&name) == Some(&value) {
            return;
        }
        let before = self.state.variables.clone();
        self.state.variables.insert(name.clone(), value.clone());
        tracing::debug!(name = name.as_str(), %value, "variable changed");
        self.publish(EngineEvent::VariableChanged { name, value });

        for (contact, key) in self.newly_satisfied_rounds(&before) {
            self.reopen_thread(&contact, key, at);
        }
    }

    /// Per contact whose thread is locked or ended, the first `.0` round whose
    /// condition was false under `before` and holds now.
    fn newly_satisfied_rounds(&self, before: &Variables) -> Vec<(String, RoundKey)> {
        let now = &self.state.variables;
        self.data
            .contacts_in_order()
            .filter(|contact| {
                matches!(
                    self.state.thread_state(&contact.name),
                    Some(ThreadState::Locked) | Some(ThreadState::Ended)
                )
            })
            .filter_map(|contact| {
                contact
                    .conditional_rounds()
                    .find(|round| {
                        round
                            .condition
                            .as_ref()
                            .map(|condition| !condition.evaluate(before) && condition.evaluate(now))
                            .unwrap_or(false)
                    })
                    .map(|round| (contact.name.clone(), round.key))
            })
            .collect()
    }

    fn reopen_thread(&mut self, contact: &str, key: RoundKey, at: u64) {
        if !matches!(
            self.state.thread_state(contact),
            Some(ThreadState::Locked) | Some(ThreadState::Ended)
        ) {
            return;
        }
        tracing::info!(contact, round = %key, "conditional round reopened thread");
        self.state.pending_end.remove(contact);
        self.set_thread(contact, ThreadState::Active);
        self.mark_unlocked(contact);
        self.enter_round(contact, key, at, Pacing::Typed, None);
    }
}
