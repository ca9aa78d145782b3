use std::path::PathBuf;

use overlay_core::TemplateSearchPath;

/// First file named `template` along the search path, in order.
pub async fn find_template(search_path: &TemplateSearchPath, template: &str) -> Option<PathBuf> {
    for candidate in search_path.candidates(template) {
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => return Some(candidate),
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_core::{OverrideDescriptor, OverrideRecord, compose_template_paths};

    #[tokio::test]
    async fn test_first_directory_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let override_dir = tmp.path().join("override");
        let default_dir = tmp.path().join("default");
        std::fs::create_dir_all(&override_dir).unwrap();
        std::fs::create_dir_all(default_dir.join("pages")).unwrap();
        std::fs::write(override_dir.join("index.html"), "override").unwrap();
        std::fs::write(default_dir.join("index.html"), "default").unwrap();
        std::fs::write(default_dir.join("pages/about.html"), "about").unwrap();

        let descriptors: Vec<OverrideDescriptor> =
            vec![OverrideRecord::new("1", 1, None, override_dir.to_string_lossy()).into()];
        let path = compose_template_paths(&descriptors, &default_dir);

        assert_eq!(
            find_template(&path, "index.html").await,
            Some(override_dir.join("index.html"))
        );
        assert_eq!(
            find_template(&path, "pages/about.html").await,
            Some(default_dir.join("pages/about.html"))
        );
        assert_eq!(find_template(&path, "missing.html").await, None);
        assert_eq!(find_template(&path, "pages").await, None);
    }

    #[tokio::test]
    async fn test_escaping_names_never_match() {
        let tmp = tempfile::tempdir().unwrap();
        let default_dir = tmp.path().join("templates");
        std::fs::create_dir_all(&default_dir).unwrap();
        std::fs::write(tmp.path().join("secret.txt"), "secret").unwrap();

        let path = TemplateSearchPath::baseline(&default_dir);
        assert_eq!(find_template(&path, "../secret.txt").await, None);
        let absolute = tmp.path().join("secret.txt");
        assert_eq!(find_template(&path, &absolute.to_string_lossy()).await, None);
    }
}
