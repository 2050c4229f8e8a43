use super::*;

impl Engine {
    /// Picks choice `index` in `contact`'s thread. Returns `false` and changes
    /// nothing when the contact is unknown, its thread is not active, it has
    /// no current round, or the index is out of range.
    pub fn submit_choice(&mut self, contact: &str, index: usize) -> bool {
        if self.state.thread_state(contact) != Some(ThreadState::Active) {
            tracing::debug!(contact, "choice ignored: thread not active");
            return false;
        }
        let Some(choice) = self.current_choices(contact).into_iter().nth(index) else {
            tracing::debug!(contact, index, "choice ignored: no such choice");
            return false;
        };

        let now = self.clock.now();
        self.push_message(
            contact,
            choice.text.clone(),
            MessageKind::Text,
            now,
            true,
            None,
            None,
        );

        match self.resolve_target(contact, &choice) {
            Some(key) => {
                tracing::debug!(contact, choice = choice.text.as_str(), round = %key, "choice resolved");
                self.enter_round(contact, key, now, Pacing::Typed, choice.embedded_action);
            }
            None => {
                tracing::info!(
                    contact,
                    target = choice.target.as_str(),
                    "choice target unresolved; ending thread"
                );
                self.state.current_rounds.remove(contact);
                self.end_thread(contact, now);
            }
        }

        self.pump();
        self.persist();
        true
    }

    /// The round a choice leads to within the same contact: the `Round-N[.M]`
    /// suffix of its target, or failing that the round whose first line reads
    /// like the choice text. A conditional round whose condition does not
    /// hold counts as unresolved.
    pub(super) fn resolve_target(&self, contact: &str, choice: &Choice) -> Option<RoundKey> {
        let entry = self.data.contact(contact)?;
        let key = match choice.target_round.or_else(|| RoundKey::extract(&choice.target)) {
            Some(key) => key,
            None => {
                let wanted = choice.text.trim();
                if wanted.is_empty() {
                    return None;
                }
                entry
                    .rounds
                    .values()
                    .find(|round| round.first_line().eq_ignore_ascii_case(wanted))?
                    .key
            }
        };
        let round = entry.round(&key)?;
        if !round.is_available(&self.state.variables) {
            tracing::debug!(contact, round = %key, "conditional round not available");
            return None;
        }
        Some(key)
    }
}
