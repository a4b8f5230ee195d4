//! glTF 2.0 <-> GLB transcoding.
//!
//! The GLB container itself is read and written by the `gltf` crate; this
//! module moves resources between URIs and the binary chunk.

use std::borrow::Cow;
use std::io;
use std::path::{Component, Path};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gltf::binary::{Glb, Header};
use gltf::json::validation::{Error as ValidationError, Validate};
use serde_json::{json, Map, Value};

use crate::error::ConversionError;

const GLB_MAGIC: [u8; 4] = *b"glTF";
const GLB_VERSION: u32 = 2;
const GLB_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Where relative resource URIs are looked up.
#[derive(Debug, Clone, Copy)]
pub struct ResourceScope<'a> {
    /// Directory relative URIs are resolved against, usually the scene's folder
    pub base: &'a Path,
    /// Directory every resolved resource must stay inside
    pub boundary: &'a Path,
}

impl<'a> ResourceScope<'a> {
    /// Resolve against and confine to the same directory.
    pub fn within(dir: &'a Path) -> Self {
        Self {
            base: dir,
            boundary: dir,
        }
    }
}

/// Unpack a GLB into a self-contained glTF scene.
///
/// The binary chunk becomes a base64 `data:` URI on the first buffer.
pub fn decode_glb(bytes: &[u8]) -> Result<Value, ConversionError> {
    let glb = Glb::from_slice(bytes).map_err(|e| ConversionError::InvalidGlb(e.to_string()))?;
    check_document(&glb.json)?;

    let mut scene: Value = serde_json::from_slice(&glb.json)
        .map_err(|e| ConversionError::InvalidGltf(e.to_string()))?;

    if let Some(bin) = glb.bin.as_deref() {
        let buffer = scene
            .get_mut("buffers")
            .and_then(Value::as_array_mut)
            .and_then(|buffers| buffers.first_mut())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                ConversionError::InvalidGlb("binary chunk present but no buffer declared".into())
            })?;

        if !buffer.contains_key("uri") {
            // The chunk may carry up to three bytes of trailing padding
            let len = buffer
                .get("byteLength")
                .and_then(Value::as_u64)
                .map_or(bin.len(), |n| (n as usize).min(bin.len()));
            buffer.insert(
                "uri".to_string(),
                Value::String(format!(
                    "data:application/octet-stream;base64,{}",
                    BASE64.encode(&bin[..len])
                )),
            );
        }
    }

    Ok(scene)
}

/// Pack a glTF scene and the resources it references into a GLB.
///
/// Buffer and image URIs are either base64 `data:` URIs or relative paths
/// resolved against `scope.base`; a resolved path may not leave `scope.boundary`.
pub fn encode_glb(mut scene: Value, scope: ResourceScope<'_>) -> Result<Vec<u8>, ConversionError> {
    let document = serde_json::to_vec(&scene).map_err(invalid)?;
    check_document(&document)?;

    let root = scene
        .as_object_mut()
        .ok_or_else(|| invalid("scene root must be a JSON object"))?;

    let mut bin: Vec<u8> = Vec::new();
    let buffer_offsets = pack_buffers(root, scope, &mut bin)?;
    rebase_buffer_views(root, &buffer_offsets)?;
    embed_images(root, scope, &mut bin)?;

    if bin.is_empty() {
        root.remove("buffers");
    } else {
        root.insert("buffers".to_string(), json!([{ "byteLength": bin.len() }]));
    }

    let json = serde_json::to_vec(&scene).map_err(invalid)?;
    let mut length = GLB_HEADER_LEN + CHUNK_HEADER_LEN + padded(json.len());
    if !bin.is_empty() {
        length += CHUNK_HEADER_LEN + padded(bin.len());
    }

    let glb = Glb {
        header: Header {
            magic: GLB_MAGIC,
            version: GLB_VERSION,
            length: length as u32,
        },
        json: Cow::Owned(json),
        bin: (!bin.is_empty()).then_some(Cow::Owned(bin)),
    };
    let bytes = glb
        .to_vec()
        .map_err(|e| ConversionError::InvalidGlb(e.to_string()))?;

    let written =
        Glb::from_slice(&bytes).map_err(|e| ConversionError::InvalidGlb(e.to_string()))?;
    check_document(&written.json)?;
    Ok(bytes)
}

/// Parse a glTF document and check its structure and indices.
///
/// Extensions are carried through untouched, so a required extension this
/// crate does not implement is not an error.
fn check_document(json: &[u8]) -> Result<(), ConversionError> {
    let document: Value = serde_json::from_slice(json).map_err(invalid)?;
    if document.pointer("/asset/version").and_then(Value::as_str).is_none() {
        return Err(invalid("asset.version is required"));
    }
    let root: gltf::json::Root =
        gltf::json::deserialize::from_value(document).map_err(invalid)?;

    let mut problems = Vec::new();
    root.validate(&root, gltf::json::Path::new, &mut |path, error| {
        if !matches!(error, ValidationError::Unsupported) {
            problems.push(format!("{} = {error}", path()));
        }
    });

    if problems.is_empty() {
        Ok(())
    } else {
        Err(invalid(problems.join("; ")))
    }
}

/// Append every declared buffer to `bin`, returning where each one starts.
fn pack_buffers(
    root: &Map<String, Value>,
    scope: ResourceScope<'_>,
    bin: &mut Vec<u8>,
) -> Result<Vec<usize>, ConversionError> {
    let Some(buffers) = root.get("buffers").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut offsets = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.iter().enumerate() {
        let byte_length = buffer
            .get("byteLength")
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid(format!("buffers[{index}] has no byteLength")))?
            as usize;
        let uri = buffer
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("buffers[{index}] has no uri")))?;

        let data = load_resource(uri, scope)?;
        if data.len() < byte_length {
            return Err(invalid(format!(
                "buffers[{index}] holds {} bytes but declares {byte_length}",
                data.len()
            )));
        }

        align(bin);
        offsets.push(bin.len());
        bin.extend_from_slice(&data[..byte_length]);
    }
    Ok(offsets)
}

/// Point every buffer view at the single packed buffer.
fn rebase_buffer_views(
    root: &mut Map<String, Value>,
    buffer_offsets: &[usize],
) -> Result<(), ConversionError> {
    let Some(views) = root.get_mut("bufferViews").and_then(Value::as_array_mut) else {
        return Ok(());
    };

    for (index, view) in views.iter_mut().enumerate() {
        let view = view
            .as_object_mut()
            .ok_or_else(|| invalid(format!("bufferViews[{index}] is not an object")))?;
        let buffer = view
            .get("buffer")
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid(format!("bufferViews[{index}] has no buffer")))?;
        let base = *buffer_offsets.get(buffer as usize).ok_or_else(|| {
            invalid(format!(
                "bufferViews[{index}] references missing buffer {buffer}"
            ))
        })?;
        let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0) as usize;

        view.insert("buffer".to_string(), json!(0));
        view.insert("byteOffset".to_string(), json!(base + offset));
    }
    Ok(())
}

/// Move URI-referenced images into the binary chunk behind new buffer views.
fn embed_images(
    root: &mut Map<String, Value>,
    scope: ResourceScope<'_>,
    bin: &mut Vec<u8>,
) -> Result<(), ConversionError> {
    let first_view = root
        .get("bufferViews")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let mut new_views = Vec::new();

    if let Some(images) = root.get_mut("images").and_then(Value::as_array_mut) {
        for (index, image) in images.iter_mut().enumerate() {
            let image = image
                .as_object_mut()
                .ok_or_else(|| invalid(format!("images[{index}] is not an object")))?;
            let Some(uri) = image.get("uri").and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };

            let data = load_resource(&uri, scope)?;
            let mime_type = image
                .get("mimeType")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| data_uri_mime(&uri))
                .unwrap_or_else(|| {
                    mime_guess::from_path(&*decode_uri_path(&uri))
                        .first_or_octet_stream()
                        .to_string()
                });

            align(bin);
            new_views.push(json!({
                "buffer": 0,
                "byteOffset": bin.len(),
                "byteLength": data.len(),
            }));
            bin.extend_from_slice(&data);

            image.remove("uri");
            image.insert(
                "bufferView".to_string(),
                json!(first_view + new_views.len() - 1),
            );
            image.insert("mimeType".to_string(), Value::String(mime_type));
        }
    }

    if !new_views.is_empty() {
        root.entry("bufferViews")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| invalid("bufferViews is not an array"))?
            .extend(new_views);
    }
    Ok(())
}

fn load_resource(uri: &str, scope: ResourceScope<'_>) -> Result<Vec<u8>, ConversionError> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid("malformed data URI"))?;
        if !meta.ends_with(";base64") {
            return Err(invalid("only base64 data URIs are supported"));
        }
        return BASE64
            .decode(payload)
            .map_err(|e| invalid(format!("invalid base64 in data URI: {e}")));
    }

    let decoded = decode_uri_path(uri);
    let relative = Path::new(&*decoded);
    // `..` is fine as long as the result stays inside the boundary
    let is_relative = relative
        .components()
        .all(|c| {
            matches!(
                c,
                Component::Normal(_) | Component::CurDir | Component::ParentDir
            )
        });
    if !is_relative {
        return Err(ConversionError::ResourceOutsideScene(uri.to_string()));
    }

    let boundary = scope.boundary.canonicalize()?;
    let resolved = match scope.base.join(relative).canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConversionError::MissingResource(uri.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    // Catches both `..` chains and symlinks that point elsewhere
    if !resolved.starts_with(&boundary) {
        return Err(ConversionError::ResourceOutsideScene(uri.to_string()));
    }

    Ok(std::fs::read(resolved)?)
}

fn decode_uri_path(uri: &str) -> Cow<'_, str> {
    urlencoding::decode(uri).unwrap_or(Cow::Borrowed(uri))
}

fn data_uri_mime(uri: &str) -> Option<String> {
    let meta = uri.strip_prefix("data:")?.split_once(',')?.0;
    let mime = meta.split(';').next()?;
    (!mime.is_empty()).then(|| mime.to_string())
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn align(bin: &mut Vec<u8>) {
    bin.resize(padded(bin.len()), 0);
}

fn invalid(message: impl ToString) -> ConversionError {
    ConversionError::InvalidGltf(message.to_string())
}
