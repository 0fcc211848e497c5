use super::registry::OverlayId;

/// Pointer state over a word overlay and the suggestion window it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    WordHovered(OverlayId),
    SuggestionHovered(OverlayId),
    Both(OverlayId),
}

/// Explicit hover state machine. Becoming [`HoverState::Idle`] is what arms
/// the suggestion teardown timer; any other state disarms it.
#[derive(Debug, Default)]
pub struct HoverMachine {
    state: HoverState,
}

impl HoverMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HoverState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == HoverState::Idle
    }

    pub fn word_entered(&mut self, id: OverlayId) -> HoverState {
        self.state = match self.state {
            HoverState::SuggestionHovered(owner) | HoverState::Both(owner) if owner == id => {
                HoverState::Both(id)
            }
            _ => HoverState::WordHovered(id),
        };
        self.state
    }

    pub fn word_exited(&mut self, id: OverlayId) -> HoverState {
        self.state = match self.state {
            HoverState::WordHovered(current) if current == id => HoverState::Idle,
            HoverState::Both(current) if current == id => HoverState::SuggestionHovered(id),
            other => other,
        };
        self.state
    }

    pub fn suggestion_entered(&mut self, owner: OverlayId) -> HoverState {
        self.state = match self.state {
            HoverState::WordHovered(current) | HoverState::Both(current) if current == owner => {
                HoverState::Both(owner)
            }
            _ => HoverState::SuggestionHovered(owner),
        };
        self.state
    }

    pub fn suggestion_exited(&mut self) -> HoverState {
        self.state = match self.state {
            HoverState::SuggestionHovered(_) => HoverState::Idle,
            HoverState::Both(id) => HoverState::WordHovered(id),
            other => other,
        };
        self.state
    }

    pub fn reset(&mut self) {
        self.state = HoverState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_from_word_to_suggestion_never_passes_idle() {
        let word = OverlayId(1);
        let mut hover = HoverMachine::new();

        assert_eq!(hover.word_entered(word), HoverState::WordHovered(word));
        assert_eq!(hover.suggestion_entered(word), HoverState::Both(word));
        assert_eq!(hover.word_exited(word), HoverState::SuggestionHovered(word));
        assert!(!hover.is_idle());
        assert_eq!(hover.suggestion_exited(), HoverState::Idle);
    }

    #[test]
    fn hovering_another_word_switches_owner() {
        let mut hover = HoverMachine::new();
        hover.word_entered(OverlayId(1));
        hover.suggestion_entered(OverlayId(1));

        assert_eq!(hover.word_entered(OverlayId(2)), HoverState::WordHovered(OverlayId(2)));
        // late exit from the first word is ignored
        assert_eq!(hover.word_exited(OverlayId(1)), HoverState::WordHovered(OverlayId(2)));
    }
}
