//! `multipart/form-data` encoding for the registration request.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::capabilities::http::ContentType;
use crate::model::{FormField, FormState, SelectedFile};

pub const FILES_FIELD: &str = "files";
pub const SAME_AS_RESIDENTIAL_FIELD: &str = "sameAsResidential";

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
enum PartBody {
    Text(String),
    File {
        filename: String,
        content_type: String,
        data: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    body: PartBody,
}

impl Part {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match &self.body {
            PartBody::File { filename, .. } => Some(filename),
            PartBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(format!("----RegistrationBoundary{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::Text(value.into()),
        });
        self
    }

    /// Adds a file part. A missing file still produces a part, with an empty filename and body.
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, file: Option<&SelectedFile>) -> Self {
        let body = match file {
            Some(file) => PartBody::File {
                filename: file.name.clone(),
                content_type: if file.mime_type.is_empty() {
                    ContentType::OctetStream.as_str().to_string()
                } else {
                    file.mime_type.clone()
                },
                data: file.data.clone(),
            },
            None => PartBody::File {
                filename: String::new(),
                content_type: ContentType::OctetStream.as_str().to_string(),
                data: Bytes::new(),
            },
        };
        self.parts.push(Part {
            name: name.into(),
            body,
        });
        self
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", ContentType::Multipart.as_str(), self.boundary)
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let payload: usize = self
            .parts
            .iter()
            .map(|p| match &p.body {
                PartBody::Text(v) => v.len(),
                PartBody::File { data, .. } => data.len(),
            })
            .sum();
        let mut buf = BytesMut::with_capacity(payload + 128 * (self.parts.len() + 1));

        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(escape_quoted(&part.name).as_bytes());
            buf.put_u8(b'"');

            match &part.body {
                PartBody::Text(value) => {
                    buf.put_slice(CRLF);
                    buf.put_slice(CRLF);
                    buf.put_slice(value.as_bytes());
                }
                PartBody::File {
                    filename,
                    content_type,
                    data,
                } => {
                    buf.put_slice(b"; filename=\"");
                    buf.put_slice(escape_quoted(filename).as_bytes());
                    buf.put_u8(b'"');
                    buf.put_slice(CRLF);
                    buf.put_slice(b"Content-Type: ");
                    buf.put_slice(content_type.as_bytes());
                    buf.put_slice(CRLF);
                    buf.put_slice(CRLF);
                    buf.put_slice(data);
                }
            }
            buf.put_slice(CRLF);
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--");
        buf.put_slice(CRLF);
        buf.to_vec()
    }
}

/// Percent-escapes the characters that would break a quoted header parameter, the way
/// browsers encode form-data names.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

impl FormState {
    /// Serializes the form as the registration request body: each scalar field once, then one
    /// `files` part per entry in list order.
    #[must_use]
    pub fn to_multipart(&self) -> MultipartForm {
        self.write_multipart(MultipartForm::new())
    }

    #[must_use]
    pub fn write_multipart(&self, mut form: MultipartForm) -> MultipartForm {
        for field in FormField::ALL {
            if field == FormField::PermanentAddress1 {
                form = form.text(SAME_AS_RESIDENTIAL_FIELD, self.same_as_residential().to_string());
            }
            form = form.text(field.wire_name(), self.field(field));
        }
        for entry in self.files() {
            form = form.file(FILES_FIELD, entry.file.as_ref());
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_text(form: &MultipartForm) -> String {
        String::from_utf8(form.encode()).unwrap()
    }

    mod encoding_tests {
        use super::*;

        #[test]
        fn test_text_part_layout() {
            let form = MultipartForm::with_boundary("XYZ").text("firstName", "Ada");

            assert_eq!(
                body_text(&form),
                "--XYZ\r\nContent-Disposition: form-data; name=\"firstName\"\r\n\r\nAda\r\n--XYZ--\r\n"
            );
        }

        #[test]
        fn test_file_part_layout() {
            let file = SelectedFile::new("id.pdf", "application/pdf", b"%PDF".to_vec());
            let form = MultipartForm::with_boundary("XYZ").file("files", Some(&file));

            assert_eq!(
                body_text(&form),
                "--XYZ\r\nContent-Disposition: form-data; name=\"files\"; filename=\"id.pdf\"\r\n\
                 Content-Type: application/pdf\r\n\r\n%PDF\r\n--XYZ--\r\n"
            );
        }

        #[test]
        fn test_missing_file_still_emits_part() {
            let form = MultipartForm::with_boundary("XYZ").file("files", None);
            let body = body_text(&form);

            assert!(body.contains("name=\"files\"; filename=\"\""));
            assert!(body.contains("Content-Type: application/octet-stream\r\n\r\n\r\n"));
        }

        #[test]
        fn test_quotes_and_newlines_escaped() {
            let file = SelectedFile::new("a\"b\r\n.png", "image/png", Vec::new());
            let form = MultipartForm::with_boundary("XYZ").file("files", Some(&file));

            assert!(body_text(&form).contains("filename=\"a%22b%0D%0A.png\""));
        }

        #[test]
        fn test_content_type_carries_boundary() {
            let form = MultipartForm::with_boundary("XYZ");
            assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
        }

        #[test]
        fn test_random_boundaries_differ() {
            assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
        }

        #[test]
        fn test_binary_payload_preserved() {
            let data = vec![0u8, 159, 146, 150, 255];
            let file = SelectedFile::new("blob.bin", "", data.clone());
            let encoded = MultipartForm::with_boundary("B").file("files", Some(&file)).encode();

            assert!(encoded.windows(data.len()).any(|w| w == data.as_slice()));
        }
    }

    mod form_serialization_tests {
        use super::*;

        #[test]
        fn test_every_scalar_field_appears_once() {
            let form = FormState::default().to_multipart();
            let names: Vec<&str> = form.parts().iter().map(Part::name).collect();

            assert_eq!(
                names,
                vec![
                    "firstName",
                    "lastName",
                    "email",
                    "dob",
                    "residentialAddress1",
                    "residentialAddress2",
                    "sameAsResidential",
                    "permanentAddress1",
                    "permanentAddress2",
                    "files",
                ]
            );
        }

        #[test]
        fn test_flag_serialized_as_bool_text() {
            let state = FormState::default().set_same_as_residential(true);
            let body = body_text(&state.write_multipart(MultipartForm::with_boundary("B")));

            assert!(body.contains("name=\"sameAsResidential\"\r\n\r\ntrue\r\n"));
        }

        #[test]
        fn test_file_parts_follow_list_order() {
            let state = FormState::default()
                .add_file_entry()
                .add_file_entry()
                .select_file(0, Some(SelectedFile::new("first.pdf", "application/pdf", Vec::new())))
                .unwrap()
                .select_file(2, Some(SelectedFile::new("third.png", "image/png", Vec::new())))
                .unwrap();
            let form = state.to_multipart();
            let filenames: Vec<&str> = form.parts().iter().filter_map(Part::filename).collect();

            assert_eq!(filenames, vec!["first.pdf", "", "third.png"]);
        }
    }
}
