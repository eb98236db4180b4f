//! RBAC custom-resource shapes. These are bit-exact `kube::CustomResource`
//! wrappers; the surrounding platform's typed-client codegen is out of scope
//! — these definitions stand in for it.

pub mod cluster;
pub mod crtb;
pub mod global_role;
pub mod grb;
pub mod policy_rule;
pub mod prtb;
pub mod role_template;
pub mod subject;
pub mod user;

pub use cluster::{Cluster, ClusterSpec};
pub use crtb::{ClusterRoleTemplateBinding, ClusterRoleTemplateBindingSpec};
pub use global_role::{GlobalRole, GlobalRoleSpec};
pub use grb::{GlobalRoleBinding, GlobalRoleBindingSpec};
pub use policy_rule::PolicyRule;
pub use prtb::{ProjectRoleTemplateBinding, ProjectRoleTemplateBindingSpec};
pub use role_template::{RoleTemplate, RoleTemplateContext, RoleTemplateSpec};
pub use user::{User, UserAttribute, UserAttributeSpec, UserSpec};
