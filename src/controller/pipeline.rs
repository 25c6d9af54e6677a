//! # Render Pipeline
//!
//! One pass over a CR. Stages run strictly in order and the first failure
//! aborts the pass; files written by earlier stages stay, since every write
//! is an idempotent overwrite fixed up by the next pass.
//!
//! 1. release name, storage class, namespace
//! 2. configs
//! 3. ejson key pair
//! 4. secrets (encrypted to the ejson public key)
//! 5. transformers
//! 6. application keys

use super::key_lifecycle::{FinalizeOutcome, KeyLifecycle, ResolvedEjsonKeys};
use crate::crd::{KeysAction, Qliksense};
use crate::error::Result;
use crate::observability::metrics;
use crate::qust;
use crate::resolver::SecretResolver;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub ejson: ResolvedEjsonKeys,
    pub keys: FinalizeOutcome,
}

/// Render every patch of `cr` under its manifests root
pub async fn render_all_patches(
    cr: &Qliksense,
    action: KeysAction,
    lifecycle: &KeyLifecycle,
    resolver: &dyn SecretResolver,
) -> Result<RenderSummary> {
    let start = Instant::now();
    let result = render(cr, action, lifecycle, resolver).await;
    metrics::observe_render_duration(start.elapsed().as_secs_f64());
    match &result {
        Ok(summary) => info!(
            cr = cr.metadata.name.as_deref().unwrap_or_default(),
            ejson = summary.ejson.source.as_str(),
            keys = ?summary.keys,
            "Rendered patches"
        ),
        Err(e) => {
            metrics::increment_render_errors();
            error!(
                cr = cr.metadata.name.as_deref().unwrap_or_default(),
                error = %e,
                "Render failed"
            );
        }
    }
    result
}

async fn render(
    cr: &Qliksense,
    action: KeysAction,
    lifecycle: &KeyLifecycle,
    resolver: &dyn SecretResolver,
) -> Result<RenderSummary> {
    // storage class adds to configs
    let mut cr = cr.clone();
    let root = cr.spec.manifests_root().to_path_buf();

    info_span!("manifest_labels").in_scope(|| -> Result<()> {
        qust::process_release_name(&root, cr.spec.release_name())?;
        qust::process_storage_class(&mut cr.spec)?;
        qust::process_namespace(&root, cr.target_namespace())?;
        Ok(())
    })?;

    info_span!("configs").in_scope(|| qust::process_configs(&cr.spec))?;

    let ejson = lifecycle
        .resolve_ejson_keys(&cr, action)
        .instrument(info_span!("ejson_keys", action = %action))
        .await?;

    qust::process_secrets(&cr.spec, ejson.public_key(), resolver)
        .instrument(info_span!("secrets"))
        .await?;

    info_span!("transformers").in_scope(|| qust::process_transformers(&cr.spec))?;

    let keys = lifecycle
        .finalize_keys(&cr, action, &ejson)
        .instrument(info_span!("application_keys", action = %action))
        .await?;

    Ok(RenderSummary { ejson, keys })
}
