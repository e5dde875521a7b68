use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::error::ErrorBadRequest;
use futures_util::TryStreamExt;

/// A parsed multipart request: exactly zero or one file part plus any text
/// fields. A second file part is rejected, not silently replaced.
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// Drains a multipart payload into memory. The size cap counts every part,
/// so a flood of small parts is bounded too; it is a transport guard, the
/// face pipeline applies its own stricter quality bounds.
pub async fn read_upload_form(mut payload: Multipart) -> Result<UploadForm, actix_web::Error> {
    let mut file = None;
    let mut fields = HashMap::new();
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(|f| f.to_string()),
            ),
            None => continue,
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > MAX_UPLOAD_BYTES {
                return Err(ErrorBadRequest("Uploaded form is too large"));
            }
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) => {
                if file.is_some() {
                    return Err(ErrorBadRequest("Only one file may be uploaded"));
                }
                file = Some(UploadedFile {
                    bytes: data,
                    filename,
                });
            }
            None => {
                let value = String::from_utf8(data)
                    .map_err(|_| ErrorBadRequest("Form field is not valid UTF-8"))?;
                fields.insert(name, value);
            }
        }
    }

    Ok(UploadForm { file, fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::PayloadError;
    use actix_web::http::header::{self, HeaderMap};
    use actix_web::web::Bytes;

    const BOUNDARY: &str = "f9a8c3e1d2b7";

    fn build_form(parts: &[(&str, Option<&str>, &[u8])]) -> Multipart {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, f
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY)
                .parse()
                .unwrap(),
        );

        Multipart::new(
            &headers,
            futures_util::stream::once(async move { Ok::<_, PayloadError>(Bytes::from(body)) }),
        )
    }

    #[actix_web::test]
    async fn parses_file_and_text_fields() {
        let form = build_form(&[
            ("username", None, b"rina".as_slice()),
            ("live_image", Some("selfie.jpg"), b"jpegbytes".as_slice()),
        ]);

        let parsed = read_upload_form(form).await.unwrap();

        assert_eq!(
            parsed.fields.get("username").map(String::as_str),
            Some("rina")
        );
        let file = parsed.file.unwrap();
        assert_eq!(file.filename, "selfie.jpg");
        assert_eq!(file.bytes, b"jpegbytes");
    }

    #[actix_web::test]
    async fn second_file_part_is_rejected() {
        let form = build_form(&[
            ("first", Some("a.jpg"), b"aaaa".as_slice()),
            ("second", Some("b.jpg"), b"bbbb".as_slice()),
        ]);

        assert!(read_upload_form(form).await.is_err());
    }

    #[actix_web::test]
    async fn size_cap_spans_all_parts() {
        // Each part fits on its own; together they cross the cap.
        let half = vec![0u8; MAX_UPLOAD_BYTES / 2 + 1];
        let form = build_form(&[
            ("padding", None, half.as_slice()),
            ("live_image", Some("selfie.jpg"), half.as_slice()),
        ]);

        assert!(read_upload_form(form).await.is_err());
    }
}
