//! Initialisation des logs
//!
//! Filtre `RUST_LOG` prioritaire, sinon le niveau passé en ligne de commande.

use tracing_subscriber::EnvFilter;

/// Filtre effectif : `RUST_LOG` s'il est défini et valide, sinon `default_level`
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installe le subscriber global (texte ou JSON)
///
/// Sans effet si un subscriber est déjà installé.
pub fn init_tracing(default_level: &str, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false);

    let result = if json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("subscriber de logs déjà installé");
    }
}
