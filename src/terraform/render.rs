//! Policy → `azuread_conditional_access_policy` resource rendering

use super::registry::ReferenceRegistry;
use super::{data_reference, naming, to_hcl_string, BlockBuilderExt, POLICY_RESOURCE_TYPE};
use crate::error::{Ca2TfError, Result};
use crate::graph::conditional_access::{
    ConditionalAccessPolicy, DirectoryRef, GrantControls, PolicyConditions, SessionControls,
    WireEnum,
};
use crate::graph::directory::{DirectoryLookup, EntityKind};
use crate::terraform::naming::NamingPolicy;
use colored::Colorize;
use hcl::{Block, Body, Expression, Number};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A policy whose document was written
#[derive(Debug, Clone)]
pub struct RenderedPolicy {
    pub id: String,
    pub display_name: String,
    pub label: String,
    pub path: PathBuf,
}

/// Outcome of rendering a batch of policies
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: Vec<RenderedPolicy>,
    pub failed: Vec<(String, Ca2TfError)>,
}

pub struct PolicyRenderer<'a, L> {
    lookup: &'a L,
    registry: &'a ReferenceRegistry,
    output_dir: PathBuf,
    naming: NamingPolicy,
}

fn wire_values<E: WireEnum>(values: &[E]) -> impl Iterator<Item = &'static str> + '_ {
    values.iter().map(|v| v.as_str())
}

impl<'a, L: DirectoryLookup> PolicyRenderer<'a, L> {
    pub fn new(
        lookup: &'a L,
        registry: &'a ReferenceRegistry,
        output_dir: &Path,
        naming: NamingPolicy,
    ) -> Self {
        Self {
            lookup,
            registry,
            output_dir: output_dir.to_path_buf(),
            naming,
        }
    }

    /// Render every policy in order. A failing policy is reported and skipped.
    pub async fn render_all(&self, policies: &[ConditionalAccessPolicy]) -> RenderReport {
        let mut report = RenderReport::default();

        for (policy, label) in naming::assign_labels(policies, self.naming) {
            let result = match label {
                Ok(label) => self.write_document(policy, label).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(rendered) => report.rendered.push(rendered),
                Err(e) => {
                    println!(
                        "{} Skipped policy '{}': {}",
                        "✗".red(),
                        policy.display_name,
                        e
                    );
                    tracing::warn!("Render failed for '{}': {:?}", policy.display_name, e);
                    report.failed.push((policy.display_name.clone(), e));
                }
            }
        }

        report
    }

    /// Render one policy to `<output_dir>/<label>.tf`.
    ///
    /// The document is written to a temporary file in the output directory and
    /// only moved into place once complete, so a failed lookup never leaves a
    /// truncated document behind.
    pub async fn render(&self, policy: &ConditionalAccessPolicy) -> Result<RenderedPolicy> {
        let label = naming::policy_label(&policy.display_name, self.naming)?;
        self.write_document(policy, label).await
    }

    async fn write_document(
        &self,
        policy: &ConditionalAccessPolicy,
        label: String,
    ) -> Result<RenderedPolicy> {
        let path = self.output_dir.join(format!("{}.tf", label));

        let output_error = |source| Ca2TfError::OutputCreateError {
            name: policy.display_name.clone(),
            source,
        };

        let mut staging = NamedTempFile::new_in(&self.output_dir).map_err(output_error)?;

        let body = self.build_document(policy, &label).await?;
        let text = to_hcl_string(&body)?;

        staging
            .write_all(text.as_bytes())
            .and_then(|_| staging.flush())
            .map_err(output_error)?;
        staging.persist(&path).map_err(|e| output_error(e.error))?;

        println!(
            "{} Created configuration for policy: {}",
            "✓".green(),
            policy.display_name
        );
        tracing::info!("Created configuration for policy: {}", policy.display_name);

        Ok(RenderedPolicy {
            id: policy.id.clone(),
            display_name: policy.display_name.clone(),
            label,
            path,
        })
    }

    /// Build the resource block for a policy without touching its output file
    pub async fn build_document(&self, policy: &ConditionalAccessPolicy, label: &str) -> Result<Body> {
        let mut resource = Block::builder("resource")
            .add_label(POLICY_RESOURCE_TYPE)
            .add_label(label.to_string())
            .add_attribute(("display_name", policy.display_name.as_str()))
            .add_attribute(("state", policy.state.as_str()))
            .add_block(self.conditions_block(&policy.conditions).await?);

        if let Some(grant) = &policy.grant_controls {
            resource = resource.add_block(grant_controls_block(grant));
        }
        if let Some(session) = &policy.session_controls {
            resource = resource.add_block(session_controls_block(session));
        }

        Ok(Body::builder().add_block(resource.build()).build())
    }

    async fn conditions_block(&self, conditions: &PolicyConditions) -> Result<Block> {
        let mut block = Block::builder("conditions")
            .add_list("client_app_types", wire_values(&conditions.client_app_types))
            .add_list("sign_in_risk_levels", wire_values(&conditions.sign_in_risk_levels))
            .add_list("user_risk_levels", wire_values(&conditions.user_risk_levels))
            .add_list(
                "service_principal_risk_levels",
                wire_values(&conditions.service_principal_risk_levels),
            );

        if let Some(apps) = &conditions.applications {
            block = block.add_block(
                Block::builder("applications")
                    .add_list("included_applications", apps.include_applications.iter().map(String::as_str))
                    .add_list("excluded_applications", apps.exclude_applications.iter().map(String::as_str))
                    .add_list("included_user_actions", apps.include_user_actions.iter().map(String::as_str))
                    .build(),
            );
        }

        if let Some(client_apps) = &conditions.client_applications {
            block = block.add_block(
                Block::builder("client_applications")
                    .add_list(
                        "included_service_principals",
                        client_apps.include_service_principals.iter().map(String::as_str),
                    )
                    .add_list(
                        "excluded_service_principals",
                        client_apps.exclude_service_principals.iter().map(String::as_str),
                    )
                    .build(),
            );
        }

        if let Some(devices) = &conditions.devices {
            let mut devices_block = Block::builder("devices");
            if let Some(filter) = &devices.device_filter {
                devices_block = devices_block.add_block(
                    Block::builder("filter")
                        .add_attribute(("mode", filter.mode.as_str()))
                        .add_attribute(("rule", filter.rule.as_str()))
                        .build(),
                );
            }
            block = block.add_block(devices_block.build());
        }

        if let Some(locations) = &conditions.locations {
            let included = self
                .reference_list(EntityKind::NamedLocation, &locations.include_locations)
                .await?;
            let excluded = self
                .reference_list(EntityKind::NamedLocation, &locations.exclude_locations)
                .await?;
            block = block.add_block(
                Block::builder("locations")
                    .add_list("included_locations", included)
                    .add_list("excluded_locations", excluded)
                    .build(),
            );
        }

        if let Some(platforms) = &conditions.platforms {
            block = block.add_block(
                Block::builder("platforms")
                    .add_list("included_platforms", wire_values(&platforms.include_platforms))
                    .add_list("excluded_platforms", wire_values(&platforms.exclude_platforms))
                    .build(),
            );
        }

        // Required by the provider schema, so present even when empty
        let users = conditions.users.clone().unwrap_or_default();
        let users_block = Block::builder("users")
            .add_list(
                "included_users",
                self.reference_list(EntityKind::User, &users.include_users).await?,
            )
            .add_list(
                "excluded_users",
                self.reference_list(EntityKind::User, &users.exclude_users).await?,
            )
            .add_list(
                "included_groups",
                self.reference_list(EntityKind::Group, &users.include_groups).await?,
            )
            .add_list(
                "excluded_groups",
                self.reference_list(EntityKind::Group, &users.exclude_groups).await?,
            )
            .add_list("included_roles", users.include_roles.iter().map(String::as_str))
            .add_list("excluded_roles", users.exclude_roles.iter().map(String::as_str))
            .build();

        Ok(block.add_block(users_block).build())
    }

    /// Sentinels stay literal strings; IDs become `data.<type>.<name>.id`
    async fn reference_list<S: WireEnum>(
        &self,
        kind: EntityKind,
        refs: &[DirectoryRef<S>],
    ) -> Result<Vec<Expression>> {
        let mut items = Vec::with_capacity(refs.len());
        for entry in refs {
            let item = match entry {
                DirectoryRef::Sentinel(sentinel) => Expression::from(sentinel.as_str()),
                DirectoryRef::Id(id) => {
                    let name = self.lookup.resolve(kind, id).await?;
                    let data_name = self.registry.ensure(kind, &name)?;
                    data_reference(kind, &data_name)
                }
            };
            items.push(item);
        }
        Ok(items)
    }
}

fn grant_controls_block(grant: &GrantControls) -> Block {
    Block::builder("grant_controls")
        .add_attribute(("operator", grant.operator.as_str()))
        .add_list("built_in_controls", wire_values(&grant.built_in_controls))
        .add_list(
            "custom_authentication_factors",
            grant.custom_authentication_factors.iter().map(String::as_str),
        )
        .add_list("terms_of_use", grant.terms_of_use.iter().map(String::as_str))
        .add_optional(
            "authentication_strength_policy_id",
            grant.authentication_strength.as_ref().map(|s| s.id.as_str()),
        )
        .build()
}

fn session_controls_block(session: &SessionControls) -> Block {
    let frequency = session.sign_in_frequency.as_ref();

    Block::builder("session_controls")
        .add_optional(
            "application_enforced_restrictions_enabled",
            session
                .application_enforced_restrictions
                .as_ref()
                .and_then(|r| r.is_enabled)
                .map(Expression::Bool),
        )
        .add_optional(
            "disable_resilience_defaults",
            session.disable_resilience_defaults.map(Expression::Bool),
        )
        .add_optional(
            "sign_in_frequency",
            frequency
                .and_then(|f| f.value)
                .map(|v| Expression::Number(Number::from(v))),
        )
        .add_optional(
            "sign_in_frequency_period",
            frequency.and_then(|f| f.frequency_type).map(|t| t.as_str()),
        )
        .add_optional(
            "sign_in_frequency_authentication_type",
            frequency.and_then(|f| f.authentication_type).map(|t| t.as_str()),
        )
        .add_optional(
            "sign_in_frequency_interval",
            frequency.and_then(|f| f.frequency_interval).map(|i| i.as_str()),
        )
        .add_optional(
            "cloud_app_security_policy",
            session
                .cloud_app_security
                .as_ref()
                .and_then(|c| c.cloud_app_security_type)
                .map(|t| t.as_str()),
        )
        .add_optional(
            "persistent_browser_mode",
            session
                .persistent_browser
                .as_ref()
                .and_then(|p| p.mode)
                .map(|m| m.as_str()),
        )
        .build()
}
