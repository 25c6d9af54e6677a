//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Directory names follow the layout of the base manifest repository, which
//! owns the `.operator` tree. The operator only writes into directories that
//! already exist there.

/// API version stamped on every generated patch document
pub const QLIK_API_VERSION: &str = "qlik.com/v1";

/// Root of the operator-owned overlay tree inside the manifests root
pub const OPERATOR_DIR: &str = ".operator";

/// Sub-directory holding generated config patches
pub const CONFIGS_DIR: &str = "configs";

/// Sub-directory holding generated secret patches and their encrypted data
pub const SECRETS_DIR: &str = "secrets";

/// Sub-directory holding transformer patches and templates
pub const TRANSFORMERS_DIR: &str = "transformers";

/// Sub-directory holding application key material patches
pub const KEYS_DIR: &str = "keys";

/// Name of every kustomization file the operator maintains
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Base transformer directory of the manifest repository
pub const BASE_TRANSFORMERS_DIR: &str = "manifests/base/transformers";

/// Umbrella service name; also the default release name
pub const DEFAULT_RELEASE_NAME: &str = "qliksense";

/// Namespace used for the backup object when the CR declares none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default directory holding the ejson private key file
pub const DEFAULT_EJSON_KEY_DIR: &str = "/opt/ejson/keys";

/// Suffix of the backup object name (`<cr-name>-operator-state-backup`)
pub const BACKUP_NAME_SUFFIX: &str = "-operator-state-backup";

/// Backup entry holding the ejson key directory
pub const EJSON_KEYS_BACKUP_KEY: &str = "ejson-keys";

/// Backup entry holding the application key directory
pub const OPERATOR_KEYS_BACKUP_KEY: &str = "operator-keys";

/// Label set on the backup object
pub const RELEASE_LABEL: &str = "release";

/// File name of the encrypted per-service secret data
pub const SECRET_DATA_FILE: &str = "edata.json";

/// File name of the encrypted per-service application key
pub const PRIVATE_KEY_FILE: &str = "eprivate_key.json";

/// File name of the encrypted JWKS document for all services
pub const JWKS_FILE: &str = "ejwks.json";

/// Transformer directory never toggled through configs/secrets
pub const STORAGE_CLASS_TRANSFORMER: &str = "storageClassName";

/// Service whose application key is a self-signed TLS certificate
pub const TLS_SERVICE: &str = "elastic-infra";

/// Service that receives additional symmetric key material
pub const EDGE_AUTH_SERVICE: &str = "edge-auth";

/// Validity of generated self-signed certificates (years)
pub const TLS_CERT_VALIDITY_YEARS: i32 = 10;

/// RSA modulus size of self-signed certificate keys
pub const TLS_KEY_BITS: usize = 4096;
