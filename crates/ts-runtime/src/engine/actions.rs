use super::*;

/// What is left to schedule after a batch of actions has been executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPlan {
    /// Message-producing actions and delayed effects, in script order.
    pub payloads: Vec<Action>,
    /// Largest delay among deferred unlock/end actions, if any ran.
    pub deferred_delay: Option<u64>,
}

impl Engine {
    /// Runs `actions` for `contact` as if they were attached to a reply sent
    /// right now, then fires whatever is already due.
    pub fn execute_actions(&mut self, contact: &str, actions: &[Action]) -> bool {
        if self.data.contact(contact).is_none() {
            tracing::warn!(contact, "execute_actions for unknown contact");
            return false;
        }
        let now = self.clock.now();
        let plan = self.plan_actions(contact, actions, now);
        self.schedule_sequence(contact, String::new(), plan, now, Pacing::Immediate);
        self.pump();
        self.persist();
        true
    }

    /// Applies zero-delay effects and deferrals now; everything that needs a
    /// place on the timeline goes into the returned plan.
    pub(super) fn plan_actions(&mut self, contact: &str, actions: &[Action], now: u64) -> ActionPlan {
        let mut plan = ActionPlan::default();
        for action in actions {
            if action.kind.is_deferred() {
                self.run_action(contact, action, now);
                plan.deferred_delay = Some(plan.deferred_delay.unwrap_or(0).max(action.delay));
            } else if action.kind.produces_message() || action.delay > 0 {
                plan.payloads.push(action.clone());
            } else {
                self.run_action(contact, action, now);
            }
        }
        plan
    }

    /// Dispatches one action to its handler. A failing handler is logged and
    /// does not affect the others.
    pub(super) fn run_action(&mut self, contact: &str, action: &Action, at: u64) {
        match self.apply_action(contact, action, at) {
            Ok(()) => {
                if !action.kind.is_deferred() {
                    self.publish(EngineEvent::ActionExecuted {
                        contact: contact.to_string(),
                        action: action.clone(),
                    });
                }
            }
            Err(error) => tracing::warn!(
                contact,
                action = action.name(),
                code = error.code.as_str(),
                message = error.message.as_str(),
                "action failed"
            ),
        }
    }

    fn apply_action(&mut self, contact: &str, action: &Action, at: u64) -> Result<(), ThreadScriptError> {
        match &action.kind {
            ActionKind::UnlockContact { contact: target } => {
                self.require_contact(target)?;
                self.state
                    .pending_unlocks
                    .entry(contact.to_string())
                    .or_default()
                    .push(target.clone());
            }
            ActionKind::EndThread => {
                self.state.pending_end.insert(contact.to_string());
            }
            ActionKind::DelayedMessage { text, contact: target } => {
                let target = target.as_deref().unwrap_or(contact);
                self.require_contact(target)?;
                self.append_message(target, text.clone(), MessageKind::Text, at);
            }
            ActionKind::SendPhoto { media, caption } => {
                self.push_message(
                    contact,
                    caption.clone().unwrap_or_default(),
                    MessageKind::Photo,
                    at,
                    false,
                    Some(media.clone()),
                    None,
                );
            }
            ActionKind::SendVideo { media, caption } => {
                self.push_message(
                    contact,
                    caption.clone().unwrap_or_default(),
                    MessageKind::Video,
                    at,
                    false,
                    Some(media.clone()),
                    None,
                );
            }
            ActionKind::DropPin { location } => {
                self.push_message(
                    contact,
                    location.label.clone(),
                    MessageKind::Location,
                    at,
                    false,
                    None,
                    Some(location.clone()),
                );
            }
            ActionKind::TypingIndicator { .. } => self.show_typing(contact, at),
            ActionKind::SetTypingDelay { typing_delay } => {
                self.state.global_typing_delay = *typing_delay;
            }
            ActionKind::SetVariable { name, value } => {
                self.assign_variable(name.clone(), value.clone(), at);
            }
            ActionKind::SetContactStatus {
                contact: target,
                status,
            } => {
                self.require_contact(target)?;
                self.state
                    .contact_status
                    .insert(target.clone(), status.clone());
            }
            ActionKind::ShowNotification { title, text } => {
                self.state.notifications.push(Notification {
                    contact: contact.to_string(),
                    title: title.clone(),
                    text: text.clone(),
                    timestamp: at,
                });
            }
            ActionKind::OpenThread { contact: target } => {
                self.require_contact(target)?;
                if !self.state.unlocked_contacts.contains(target) {
                    return Err(ThreadScriptError::new(
                        "ENGINE_CONTACT_LOCKED",
                        format!("Cannot open locked thread \"{}\".", target),
                    ));
                }
                self.state.viewed_contacts.insert(target.clone());
            }
            // Host-side effects: the published action carries everything the host needs.
            ActionKind::Vibrate { .. }
            | ActionKind::Call911
            | ActionKind::TriggerEliNeedsCode
            | ActionKind::TriggerEmergencyCall { .. } => {}
        }
        Ok(())
    }

    fn require_contact(&self, name: &str) -> Result<(), ThreadScriptError> {
        if self.data.contact(name).is_some() {
            return Ok(());
        }
        Err(ThreadScriptError::new(
            "ENGINE_CONTACT_UNKNOWN",
            format!("Contact \"{}\" does not exist.", name),
        ))
    }
}
