//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values form the platform contract between the operator, the
//! Services it mutates, and the workload pods it notifies.

/// Annotation that opts a Service into Decofile injection
pub const INJECT_ANNOTATION: &str = "deco.sites/decofile-inject";

/// Annotation overriding the default volume mount directory
pub const MOUNT_PATH_ANNOTATION: &str = "deco.sites/decofile-mount-path";

/// Label on a Service carrying the deployment id used to bind a Decofile (user-set)
pub const DEPLOYMENT_ID_LABEL: &str = "app.deco/deploymentId";

/// Label stamped onto the pod template at admission; the notifier selects pods on it
pub const DECOFILE_LABEL: &str = "deco.sites/decofile";

/// Container the operator targets for the mount and env injection.
/// Falls back to the first container when no container carries this name.
pub const APP_CONTAINER_NAME: &str = "app";

/// Environment variable pointing the application at the mounted document
pub const DECO_RELEASE_ENV: &str = "DECO_RELEASE";

/// Environment variable holding the reload authorization token
pub const RELOAD_TOKEN_ENV: &str = "DECO_RELEASE_RELOAD_TOKEN";

/// Name of the injected ConfigMap volume
pub const DECOFILE_VOLUME_NAME: &str = "decofile-config";

/// Default mount directory when the mount-path annotation is absent
pub const DEFAULT_MOUNT_DIR: &str = "/app/decofile";

/// ConfigMap key holding the uncompressed JSON document
pub const CONTENT_KEY_JSON: &str = "decofile.json";

/// ConfigMap key holding the base64 of the Brotli-compressed document
pub const CONTENT_KEY_BIN: &str = "decofile.bin";

/// ConfigMap key holding the content timestamp in Unix seconds
pub const TIMESTAMP_KEY: &str = "timestamp.txt";

/// Compression threshold: 2.5 MiB (the ConfigMap limit is 3 MiB, leave buffer)
pub const COMPRESSION_THRESHOLD: usize = 2_621_440;

/// Reload endpoint path served by workload pods
pub const RELOAD_PATH: &str = "/.decofile/reload";

/// Port used when the pod declares no container port
pub const DEFAULT_RELOAD_PORT: i32 = 8000;

/// Attempts per pod before the notification counts as failed
pub const NOTIFY_MAX_RETRIES: u32 = 3;

/// Initial retry backoff between notification attempts, doubled on each retry
pub const NOTIFY_INITIAL_BACKOFF_SECS: u64 = 2;

/// Per-request timeout for a single pod notification
pub const NOTIFY_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bound on in-flight pod notifications
pub const DEFAULT_NOTIFY_CONCURRENCY: usize = 10;

/// Default deadline covering an entire notification fan-out
pub const DEFAULT_NOTIFY_DEADLINE_SECS: u64 = 120;

/// Default HTTP server port for metrics, probes and admission endpoints
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Environment variable holding the fallback archive-fetch credential
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Requeue interval for spec errors the user has to fix (seconds)
pub const INVALID_SPEC_REQUEUE_SECS: u64 = 300;

/// Requeue interval while a referenced credential secret is missing (seconds)
pub const CREDENTIAL_MISSING_REQUEUE_SECS: u64 = 300;

/// Requeue interval after a partial or timed-out notification fan-out (seconds)
pub const NOTIFY_FAILURE_REQUEUE_SECS: u64 = 60;

/// Requeue interval after an optimistic-concurrency conflict (seconds)
pub const CONFLICT_REQUEUE_SECS: u64 = 1;

/// Exponential backoff starting value for transient reconcile errors (seconds)
pub const BACKOFF_START_SECS: u64 = 2;

/// Exponential backoff maximum value for transient reconcile errors (seconds)
pub const BACKOFF_MAX_SECS: u64 = 300;
