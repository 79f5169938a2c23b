/// Helper macro to avoid retyping the base domain-like name of our system when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name of
/// the system. When given a string literal parameter it adds `/parameter` to the end.
macro_rules! composer {
    () => {
        "composer.dev"
    };
    ($s:literal) => {
        concat!(composer!(), "/", $s)
    };
}

// System identifiers
pub const COMPOSER: &str = composer!();

// Names of finalizers used by the controller
pub const FINALIZER_MAIN: &str = composer!("finalizer");

// Annotation keys
pub const ANNOTATION_VERBOSE: &str = composer!("verbose");
pub const ANNOTATION_LAST_APPLIED: &str = "kubectl.kubernetes.io/last-applied-configuration";
pub const ANNOTATION_HELM_HOOK: &str = "helm.sh/hook";

// Definitions bind a resource group and kind to an API description
pub const DEFINITION_GROUP: &str = composer!();
pub const DEFINITION_VERSION: &str = "v1alpha1";
pub const DEFINITION_KIND: &str = "Definition";

// Labels that tie a chart definition to the resource it installs
pub const LABEL_CRD_GROUP: &str = composer!("crd-group");
pub const LABEL_CRD_VERSION: &str = composer!("crd-version");
pub const LABEL_CRD_RESOURCE: &str = composer!("crd-resource");

// Credential resources live next to the managed resource at a fixed version
pub const AUTH_VERSION: &str = "v1alpha1";
pub const AUTH_REF_SUFFIX: &str = "AuthRef";
pub const AUTH_KIND_SUFFIX: &str = "Auth";
pub const AUTHENTICATION_REFS: &str = "authenticationRefs";

// Condition type and reasons
pub const CONDITION_READY: &str = "Ready";
pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

// Condition types whose status must be `True` for an object to count as available
pub const AVAILABILITY_MARKERS: [&str; 5] = ["ready", "complete", "healthy", "active", "able"];

#[test]
fn composer_constants_macro_test() {
    assert_eq!("composer.dev", composer!());
    assert_eq!("composer.dev/finalizer", FINALIZER_MAIN);
    assert_eq!("composer.dev/foo", composer!("foo"));
}
