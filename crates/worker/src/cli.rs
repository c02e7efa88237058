//! Command-line arguments.
//!
//! ```text
//! vidforge-worker [--image <path>] <prompt words...>
//! ```
//!
//! The file passed to `--image` holds a `data:<mime>;base64,<payload>` URL.

use std::path::PathBuf;

use vidforge_core::request::{GenerationRequest, ReferenceImage};

use crate::config::ConfigError;

pub const USAGE: &str = "usage: vidforge-worker [--image <path>] <prompt words...>";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub prompt: String,
    pub image_path: Option<PathBuf>,
}

impl Invocation {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut words = Vec::new();
        let mut image_path = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--image" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::Usage(format!("--image needs a path\n{USAGE}")))?;
                    image_path = Some(PathBuf::from(path));
                }
                "-h" | "--help" => return Err(ConfigError::Usage(USAGE.into())),
                _ => words.push(arg),
            }
        }

        Ok(Self {
            prompt: words.join(" "),
            image_path,
        })
    }

    /// Build the generation request, reading the reference image if given.
    ///
    /// The request is not validated here; the poller does that on submit.
    pub async fn load_request(&self) -> Result<GenerationRequest, ConfigError> {
        let request = GenerationRequest::text(self.prompt.clone());
        let Some(path) = &self.image_path else {
            return Ok(request);
        };

        let data_url = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Image {
                path: path.clone(),
                source,
            })?;
        let image = ReferenceImage::from_data_url(data_url.trim())?;
        Ok(request.with_reference_image(image))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, ConfigError> {
        Invocation::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn prompt_words_are_joined() {
        let invocation = parse(&["a", "red", "bicycle"]).unwrap();
        assert_eq!(invocation.prompt, "a red bicycle");
        assert_eq!(invocation.image_path, None);
    }

    #[test]
    fn image_flag_takes_a_path() {
        let invocation = parse(&["--image", "cat.txt", "make", "it", "move"]).unwrap();
        assert_eq!(invocation.prompt, "make it move");
        assert_eq!(invocation.image_path, Some(PathBuf::from("cat.txt")));
    }

    #[test]
    fn image_flag_without_path_is_a_usage_error() {
        assert_matches!(parse(&["hello", "--image"]), Err(ConfigError::Usage(_)));
    }

    #[test]
    fn no_arguments_give_an_empty_prompt() {
        assert_eq!(parse(&[]).unwrap().prompt, "");
    }

    #[tokio::test]
    async fn reference_image_is_read_from_a_data_url_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.txt");
        std::fs::write(&path, "data:image/png;base64,iVBORw0KGgo=\n").unwrap();

        let invocation = Invocation {
            prompt: "animate".into(),
            image_path: Some(path),
        };
        let request = invocation.load_request().await.unwrap();

        let image = request.reference_image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn missing_image_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = Invocation {
            prompt: "animate".into(),
            image_path: Some(dir.path().join("nope.txt")),
        };
        assert_matches!(
            invocation.load_request().await,
            Err(ConfigError::Image { .. })
        );
    }
}
