//! Choice building for the form chooser.
//!
//! The rendering surface is the host's concern; this module only decides
//! which choices exist for an actor given its current state and the
//! resolved candidate forms.

use formshift_domain::ActorShapeState;

use crate::ports::ActorRef;

/// One selectable entry in the form chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeChoice {
    /// Revert to the actor's original form.
    Original,
    /// Transform into this form actor.
    Form(ActorRef),
}

impl ShapeChoice {
    pub fn label(&self) -> &str {
        match self {
            Self::Original => "Original Form",
            Self::Form(actor) if actor.name.is_empty() => "Unnamed Form",
            Self::Form(actor) => &actor.name,
        }
    }
}

/// Build the choice list: candidate forms minus the one currently worn,
/// with "Original Form" offered first while the actor is shaped.
pub fn build_shape_choices(
    state: Option<&ActorShapeState>,
    form_actors: &[ActorRef],
) -> Vec<ShapeChoice> {
    let shaped = state.filter(|state| state.is_shaped);
    let current_form_id = shaped.map(|state| state.current_form_actor_id.as_str());

    let mut choices: Vec<ShapeChoice> = Vec::new();
    if shaped.is_some() {
        choices.push(ShapeChoice::Original);
    }
    choices.extend(
        form_actors
            .iter()
            .filter(|actor| !actor.id.is_empty() && Some(actor.id.as_str()) != current_form_id)
            .map(|actor| ShapeChoice::Form(actor.clone())),
    );
    choices
}
