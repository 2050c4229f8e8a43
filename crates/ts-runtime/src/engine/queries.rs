use super::*;

impl Engine {
    pub fn game_data(&self) -> &GameData {
        &self.data
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn contact_messages(&self, contact: &str) -> &[Message] {
        self.state
            .messages
            .get(contact)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Unlocked contacts in declaration order.
    pub fn unlocked_contacts(&self) -> Vec<&str> {
        self.data
            .contact_order
            .iter()
            .filter(|name| self.state.unlocked_contacts.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn contact_state(&self, contact: &str) -> Option<ThreadState> {
        self.state.thread_state(contact)
    }

    pub fn current_round(&self, contact: &str) -> Option<&Round> {
        let key = self.state.current_rounds.get(contact)?;
        self.data.contact(contact)?.round(key)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.state.variables.get(name)
    }

    /// Choices visible in the current round under the live variables. Empty
    /// unless the thread is active.
    pub fn current_choices(&self, contact: &str) -> Vec<Choice> {
        if self.state.thread_state(contact) != Some(ThreadState::Active) {
            return Vec::new();
        }
        self.current_round(contact)
            .map(|round| self.evaluate_round(round).choices)
            .unwrap_or_default()
    }

    pub fn contact_status(&self, contact: &str) -> Option<&str> {
        self.state.contact_status.get(contact).map(String::as_str)
    }

    pub fn global_typing_delay(&self) -> u64 {
        self.state.global_typing_delay
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.state.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let taken = std::mem::take(&mut self.state.notifications);
        if !taken.is_empty() {
            self.persist();
        }
        taken
    }

    pub fn pending_task_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_task_at(&self) -> Option<u64> {
        self.scheduler.next_fire_at()
    }

    pub fn is_viewed(&self, contact: &str) -> bool {
        self.state.viewed_contacts.contains(contact)
    }

    /// Marks the thread as seen and every message in it as read.
    pub fn view_contact(&mut self, contact: &str) -> bool {
        if !self.state.unlocked_contacts.contains(contact) {
            return false;
        }
        self.state.viewed_contacts.insert(contact.to_string());
        if let Some(messages) = self.state.messages.get_mut(contact) {
            for message in messages.iter_mut() {
                message.read = true;
            }
        }
        self.persist();
        true
    }
}
