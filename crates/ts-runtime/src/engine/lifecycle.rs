use super::*;

impl Engine {
    /// Builds an engine for `data`, resuming from the store when it holds a
    /// readable document and starting fresh otherwise.
    pub fn new(data: GameData, options: EngineOptions) -> Self {
        let EngineOptions {
            global_typing_delay_ms,
            typing_indicator_ms,
            clock,
            store,
        } = options;

        let restored = match store.read() {
            Ok(Some(document)) => match decode_state(&document) {
                Ok(state) => Some(state),
                Err(error) => {
                    tracing::warn!(
                        code = error.code.as_str(),
                        message = error.message.as_str(),
                        "persisted state unreadable; starting fresh"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(
                    code = error.code.as_str(),
                    message = error.message.as_str(),
                    "state store unavailable; starting fresh"
                );
                None
            }
        };

        let resumed = restored.is_some();
        let state = match restored {
            Some(state) => reconcile_state(state, &data),
            None => GameState::initial(&data, global_typing_delay_ms),
        };

        let mut engine = Self {
            data,
            state,
            scheduler: Scheduler::new(),
            events: EventBus::new(),
            clock,
            store,
            epoch: 0,
            default_typing_delay: global_typing_delay_ms,
            typing_indicator_ms,
        };

        let now = engine.clock.now();
        if resumed {
            tracing::info!(contacts = engine.data.contacts.len(), "resumed persisted state");
            engine.restore_deliveries(now);
        } else {
            tracing::info!(contacts = engine.data.contacts.len(), "starting new game");
            engine.seed_opening(now);
        }
        engine.pump();
        engine.persist();
        engine
    }

    /// Drops every scheduled task and starts the story over.
    pub fn reset_game(&mut self) {
        let cancelled = self.cancel_scheduled();
        self.state = GameState::initial(&self.data, self.default_typing_delay);
        if let Err(error) = self.store.clear() {
            tracing::warn!(
                code = error.code.as_str(),
                message = error.message.as_str(),
                "failed to clear state store"
            );
        }
        tracing::info!(cancelled, epoch = self.epoch, "game reset");

        let now = self.clock.now();
        self.seed_opening(now);
        self.pump();
        self.persist();
    }

    /// Recompiles `source` and swaps it in. A script with structural errors is
    /// rejected and the running program is left untouched; warnings are
    /// returned.
    pub fn load_script(&mut self, source: &str) -> Result<Vec<Diagnostic>, ThreadScriptError> {
        let output = ts_compiler::compile(source);
        let warnings = output.warnings.clone();
        let program = output.into_result()?;
        self.load_program(program);
        Ok(warnings)
    }

    /// Swaps in a compiled program. Runtime variables the player changed away
    /// from the old defaults survive; everything else takes the new defaults.
    pub fn load_program(&mut self, data: GameData) {
        let cancelled = self.cancel_scheduled();

        let preserved = self
            .state
            .variables
            .iter()
            .filter(|(name, value)| self.data.initial_variables.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect::<Variables>();

        let previous = std::mem::replace(
            &mut self.state,
            GameState::initial(&data, self.default_typing_delay),
        );
        let mut state = reconcile_state(previous, &data);
        state.variables = data.initial_variables.clone();
        state.variables.extend(preserved);
        state.pending_unlocks.clear();
        state.pending_end.clear();
        state.pending_deliveries.clear();
        self.state = state;
        self.data = data;

        tracing::info!(
            cancelled,
            epoch = self.epoch,
            contacts = self.data.contacts.len(),
            "script loaded"
        );

        if self.state.messages.values().all(Vec::is_empty) {
            let now = self.clock.now();
            self.seed_opening(now);
            self.pump();
        }
        self.persist();
    }

    fn cancel_scheduled(&mut self) -> usize {
        self.epoch += 1;
        self.scheduler.cancel_all()
    }

    /// The first initially-unlocked contact opens the conversation.
    fn seed_opening(&mut self, now: u64) {
        let Some((name, key)) = self
            .data
            .first_initial_contact()
            .and_then(|contact| Some((contact.name.clone(), contact.first_round_key()?)))
        else {
            return;
        };
        self.enter_round(&name, key, now, Pacing::Immediate, None);
    }

    /// Puts saved timeline work back on the scheduler at its original times;
    /// anything already overdue fires on the next pump. Pending notice flags
    /// with no saved notices task get one now.
    fn restore_deliveries(&mut self, now: u64) {
        let saved = std::mem::take(&mut self.state.pending_deliveries);
        let mut noticed = std::collections::BTreeSet::new();
        for pending in saved {
            if pending.delivery == Delivery::Notices {
                noticed.insert(pending.contact.clone());
            }
            self.schedule_task(&pending.contact, pending.fire_at, pending.delivery);
        }

        let orphaned = self
            .state
            .pending_unlocks
            .keys()
            .chain(self.state.pending_end.iter())
            .filter(|contact| !noticed.contains(*contact))
            .cloned()
            .collect::<std::collections::BTreeSet<_>>();
        for contact in orphaned {
            self.schedule_task(&contact, now, Delivery::Notices);
        }
    }
}

/// Fits a state saved against some program onto `data`: contacts that no
/// longer exist are dropped, new contacts start from their initial state, and
/// current rounds that vanished fall back to the contact's first round.
fn reconcile_state(mut state: GameState, data: &GameData) -> GameState {
    let fresh = GameState::initial(data, state.global_typing_delay);

    state.threads.retain(|name, _| data.contacts.contains_key(name));
    state.messages.retain(|name, _| data.contacts.contains_key(name));
    state.current_rounds.retain(|name, _| data.contacts.contains_key(name));
    state.unlocked_contacts.retain(|name| data.contacts.contains_key(name));
    state.viewed_contacts.retain(|name| data.contacts.contains_key(name));
    state.pending_unlocks.retain(|name, _| data.contacts.contains_key(name));
    state.pending_end.retain(|name| data.contacts.contains_key(name));
    state.contact_status.retain(|name, _| data.contacts.contains_key(name));
    state
        .pending_deliveries
        .retain(|pending| data.contacts.contains_key(&pending.contact));

    for contact in data.contacts_in_order() {
        let name = &contact.name;
        if !state.threads.contains_key(name) {
            if let Some(thread) = fresh.thread_state(name) {
                state.threads.insert(name.clone(), thread);
            }
            if fresh.unlocked_contacts.contains(name) {
                state.unlocked_contacts.insert(name.clone());
            }
        }
        state.messages.entry(name.clone()).or_default();

        let valid = state
            .current_rounds
            .get(name)
            .map(|key| contact.round(key).is_some())
            .unwrap_or(false);
        if !valid {
            state.current_rounds.remove(name);
            let unlocked = state.thread_state(name) != Some(ThreadState::Locked);
            if let Some(first) = contact.first_round_key().filter(|_| unlocked) {
                state.current_rounds.insert(name.clone(), first);
            }
        }
    }

    for (name, value) in &data.initial_variables {
        state
            .variables
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    state
}
