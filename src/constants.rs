// src/constants.rs

/// The name of the application, used for the user config and cache directories.
pub const APP_DIR_NAME: &str = "recipe-runner";

/// The name of the directory containing recipe-runner state for a project.
pub const PROJECT_DIR: &str = ".recipe";

/// The name of the config file inside a project's `.recipe/` directory.
pub const PROJECT_CONFIG_FILENAME: &str = "config.json";

/// The name of the config file in the global and user scopes.
pub const SCOPE_CONFIG_FILENAME: &str = "recipe-config.json";

/// The name of the manifest file at the root of every recipe package.
pub const RECIPE_MANIFEST_FILENAME: &str = "recipe.json";

/// The entry point used when a manifest does not declare `main`.
pub const DEFAULT_RECIPE_MAIN: &str = "index";

/// The only recipe type currently published.
pub const RECIPE_TYPE: &str = "gulp";

/// The only recipe scope currently published.
pub const RECIPE_SCOPE: &str = "public";

/// The name of the directory holding unversioned local tasks ("elves").
pub const ELVES_DIR: &str = "elves";

/// The name of the directory holding installed recipe packages.
pub const RECIPES_DIR: &str = "recipes";

/// The name of the sub-directory of the cache dir holding downloaded tarballs.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Extension of packaged recipe tarballs.
pub const PACKAGE_EXTENSION: &str = "tgz";

/// Path of the publish endpoint, relative to the server URL.
pub const PUBLISH_ENDPOINT: &str = "api/v1/publish";

/// Path prefix of package downloads, relative to the server URL.
pub const PACKAGES_ENDPOINT: &str = "api/v1/packages";

/// Entries never included in a packaged recipe.
pub const PACKAGE_IGNORED_ENTRIES: &[&str] = &[".git", "node_modules", PROJECT_DIR];
