//! Small text templates and the `{key}` substitution used to fill them.

use crate::shell::ShellKind;

/// Activation script sourced by `bash` when an orb is activated.
pub const ACTIVATE_ORB_BASH: &str = include_str!("templates/activate_orb.bash");
/// Activation script sourced by `fish` when an orb is activated.
pub const ACTIVATE_ORB_FISH: &str = include_str!("templates/activate_orb.fish");
/// Header written to the top of every generated lockfile.
pub const LOCKFILE_HEADER: &str = include_str!("templates/lockfile_header");
/// Bash completion script printed by `orb --bash`.
pub const ORB_COMPLETION_BASH: &str = include_str!("templates/orb-completion.bash");

/// Returns the activation script template for the given shell flavor.
pub fn activation_template(kind: ShellKind) -> &'static str {
    match kind {
        ShellKind::Bash => ACTIVATE_ORB_BASH,
        ShellKind::Fish => ACTIVATE_ORB_FISH,
    }
}

/// Renders a template by replacing every `{key}` placeholder with its value.
pub fn render(template: &str, context: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in context {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}
