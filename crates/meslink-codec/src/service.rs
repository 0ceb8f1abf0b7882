//! Service package text codec.
//!
//! Request wire format:
//! ```text
//! 444;[RequestId=<id>;]MClass=<n>;MNo=<n>;ErrorState=<n>;#<name>=<value>;...*
//! ```
//!
//! Responses carry a 4-character preamble followed by `key=value` segments
//! separated by `;`. Keys declared in the parameter schema are typed; the
//! rest pass through as strings.

use std::borrow::Cow;
use std::collections::HashSet;

use meslink_schema::{ParameterKind, ParameterSchema};
use tracing::trace;

use crate::error::{CodecError, Result};
use crate::package::{ParamValue, ServicePackage};
use crate::status::ResourceIdentity;

/// Literal that opens every request.
pub const REQUEST_PREAMBLE: &str = "444;";

/// Number of characters dropped from the front of every response.
pub const RESPONSE_PREAMBLE_LEN: usize = 4;

/// Literal that closes every request.
pub const TERMINATOR: char = '*';

const PARAMETER_PREFIX: char = '#';
const HEADER_CLASS: &str = "MClass";
const HEADER_NUMBER: &str = "MNo";
const HEADER_ERROR_STATE: &str = "ErrorState";
const RESERVED: [char; 3] = [';', '=', TERMINATOR];

/// Encode a request package as sent by `sender`.
///
/// Fails before producing any text if a parameter name or string value would
/// break the `key=value;` grammar.
pub fn encode_request(request: &ServicePackage, sender: &ResourceIdentity) -> Result<String> {
    let mut wire = String::with_capacity(64 + 16 * request.standard_parameters.len());
    wire.push_str(REQUEST_PREAMBLE);

    if sender.is_resource() {
        wire.push_str(&format!("RequestId={};", sender.id()));
    }
    wire.push_str(&format!(
        "{HEADER_CLASS}={};{HEADER_NUMBER}={};{HEADER_ERROR_STATE}={};",
        request.message_class, request.message_number, request.error_state
    ));

    for (name, value) in &request.standard_parameters {
        let name = wire_name(name)?;
        if let ParamValue::Str(text) = value {
            check_token(text, "string value contains ';', '=' or '*'")?;
        }
        wire.push_str(&format!("{name}={value};"));
    }

    if wire.ends_with(';') {
        wire.pop();
    }
    wire.push(TERMINATOR);
    Ok(wire)
}

/// Decode raw response bytes.
pub fn decode_response_bytes(bytes: &[u8], schema: &ParameterSchema) -> Result<ServicePackage> {
    decode_response(std::str::from_utf8(bytes)?, schema)
}

/// Decode a response string against `schema`.
///
/// `MClass`, `MNo` and `ErrorState` fill the package header. Every other key
/// lands in `standard_parameters` when the schema declares it and in
/// `service_specific_parameters` otherwise, both in encounter order. A
/// leading `#` on a key is not part of the name.
pub fn decode_response(text: &str, schema: &ParameterSchema) -> Result<ServicePackage> {
    let body = match text.char_indices().nth(RESPONSE_PREAMBLE_LEN) {
        Some((offset, _)) => &text[offset..],
        None => "",
    };
    let body = body.replace("\\r", "");
    let body = body.trim();
    let body = body.strip_suffix(TERMINATOR).unwrap_or(body);
    if body.trim().is_empty() {
        return Err(CodecError::EmptyResponse);
    }

    let mut package = ServicePackage::default();
    let mut seen = HashSet::new();

    for segment in body.split(';').filter(|segment| !segment.trim().is_empty()) {
        let (key, value) = split_segment(segment)?;
        let name = key.strip_prefix(PARAMETER_PREFIX).unwrap_or(key);
        if !seen.insert(name) {
            return Err(CodecError::DuplicateKey(name.to_string()));
        }

        match name {
            HEADER_CLASS => package.message_class = parse_header(HEADER_CLASS, value)?,
            HEADER_NUMBER => package.message_number = parse_header(HEADER_NUMBER, value)?,
            HEADER_ERROR_STATE => {
                package.error_state = parse_header(HEADER_ERROR_STATE, value)?;
            }
            _ => match schema.kind_of(name) {
                Some(kind) => {
                    let typed = coerce(name, kind, value)?;
                    package.standard_parameters.insert(name.to_string(), typed);
                }
                None => {
                    package
                        .service_specific_parameters
                        .insert(name.to_string(), ParamValue::Str(value.to_string()));
                }
            },
        }
    }

    trace!(
        message_class = package.message_class,
        message_number = package.message_number,
        standard = package.standard_parameters.len(),
        service_specific = package.service_specific_parameters.len(),
        "decoded service response"
    );
    Ok(package)
}

fn split_segment(segment: &str) -> Result<(&str, &str)> {
    let mut parts = segment.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(CodecError::MalformedSegment(segment.trim().to_string())),
    }
}

fn parse_header(name: &'static str, value: &str) -> Result<i16> {
    value.parse().map_err(|_| CodecError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

fn coerce(name: &str, kind: ParameterKind, value: &str) -> Result<ParamValue> {
    let invalid = || CodecError::InvalidValue {
        name: name.to_string(),
        kind,
        value: value.to_string(),
    };
    match kind {
        ParameterKind::Int16 => value.parse().map(ParamValue::Int16).map_err(|_| invalid()),
        ParameterKind::Int32 => value.parse().map(ParamValue::Int32).map_err(|_| invalid()),
        ParameterKind::String => Ok(ParamValue::Str(value.to_string())),
    }
}

fn wire_name(name: &str) -> Result<Cow<'_, str>> {
    let bare = name.strip_prefix(PARAMETER_PREFIX).unwrap_or(name);
    if bare.trim().is_empty() {
        return Err(CodecError::InvalidToken {
            token: name.to_string(),
            reason: "parameter name is empty",
        });
    }
    check_token(bare, "parameter name contains ';', '=' or '*'")?;

    if name.starts_with(PARAMETER_PREFIX) {
        Ok(Cow::Borrowed(name))
    } else {
        Ok(Cow::Owned(format!("{PARAMETER_PREFIX}{name}")))
    }
}

fn check_token(token: &str, reason: &'static str) -> Result<()> {
    if token.contains(RESERVED) {
        return Err(CodecError::InvalidToken {
            token: token.to_string(),
            reason,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use meslink_schema::ParameterDefinition;

    use super::*;
    use crate::status::PlcByteOrder;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterDefinition::new(1, "ResourceID", ParameterKind::Int16),
            ParameterDefinition::new(2, "StepNo", ParameterKind::Int16),
            ParameterDefinition::new(3, "Counter", ParameterKind::Int32),
            ParameterDefinition::new(4, "Barcode", ParameterKind::String).with_string_length(40),
        ])
        .unwrap()
    }

    fn resource(id: u16) -> ResourceIdentity {
        ResourceIdentity::resource(id, PlcByteOrder::LittleEndian)
    }

    #[test]
    fn encodes_documented_request() {
        let request = ServicePackage::request(100, 1).with_parameter("ResourceID", 50i16);
        let wire = encode_request(&request, &resource(50)).unwrap();
        assert_eq!(
            wire,
            "444;RequestId=50;MClass=100;MNo=1;ErrorState=0;#ResourceID=50*"
        );
    }

    #[test]
    fn non_resource_sender_omits_request_id() {
        let request = ServicePackage::request(7, 2).with_error_state(3);
        let wire = encode_request(&request, &ResourceIdentity::client(PlcByteOrder::BigEndian))
            .unwrap();
        assert_eq!(wire, "444;MClass=7;MNo=2;ErrorState=3*");
    }

    #[test]
    fn existing_hash_prefix_is_not_doubled() {
        let request = ServicePackage::request(1, 1)
            .with_parameter("#StepNo", 4i16)
            .with_parameter("Barcode", "SN-0042")
            .with_parameter("Counter", -70_000i32);
        let wire = encode_request(&request, &resource(1)).unwrap();
        assert_eq!(
            wire,
            "444;RequestId=1;MClass=1;MNo=1;ErrorState=0;#StepNo=4;#Barcode=SN-0042;#Counter=-70000*"
        );
    }

    #[test]
    fn rejects_values_that_break_the_grammar() {
        for request in [
            ServicePackage::request(1, 1).with_parameter("Barcode", "a;b"),
            ServicePackage::request(1, 1).with_parameter("Barcode", "a=b"),
            ServicePackage::request(1, 1).with_parameter("Bar*code", 1i16),
            ServicePackage::request(1, 1).with_parameter("#", 1i16),
            ServicePackage::request(1, 1).with_parameter("", 1i16),
        ] {
            let err = encode_request(&request, &resource(1)).unwrap_err();
            assert!(matches!(err, CodecError::InvalidToken { .. }), "{err:?}");
        }
    }

    #[test]
    fn decodes_documented_response() {
        let package =
            decode_response("XXXX MClass=100;MNo=1;ErrorState=0;#StepNo=7;", &schema()).unwrap();

        assert_eq!(package.message_class, 100);
        assert_eq!(package.message_number, 1);
        assert_eq!(package.error_state, 0);
        assert_eq!(package.standard_parameters.len(), 1);
        assert_eq!(
            package.standard_parameters.get("StepNo"),
            Some(&ParamValue::Int16(7))
        );
        assert!(package.service_specific_parameters.is_empty());
    }

    #[test]
    fn splits_standard_and_service_specific_in_encounter_order() {
        let package = decode_response(
            "444;MClass=101;MNo=2;ErrorState=0;#Counter=70000;Note=hello;#Barcode=SN 1;Extra=x*",
            &schema(),
        )
        .unwrap();

        let standard: Vec<(&str, &ParamValue)> = package
            .standard_parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        assert_eq!(
            standard,
            [
                ("Counter", &ParamValue::Int32(70_000)),
                ("Barcode", &ParamValue::Str("SN 1".to_string())),
            ]
        );

        let specific: Vec<&str> = package
            .service_specific_parameters
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(specific, ["Note", "Extra"]);
        assert_eq!(package.parameter("Note"), Some(&ParamValue::from("hello")));
    }

    #[test]
    fn strips_literal_carriage_return_escapes() {
        let package =
            decode_response(r"444;MClass=1;MNo=1;ErrorState=2;#StepNo=9\r;", &schema()).unwrap();
        assert_eq!(package.parameter("StepNo"), Some(&ParamValue::Int16(9)));
        assert!(package.is_error());
    }

    #[test]
    fn segment_without_equals_is_malformed() {
        let err = decode_response("444;MClass=1;garbage;MNo=1", &schema()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedSegment(segment) if segment == "garbage"));
    }

    #[test]
    fn segment_with_two_equals_is_malformed() {
        let err = decode_response("444;A=b=c", &schema()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedSegment(segment) if segment == "A=b=c"));
    }

    #[test]
    fn repeated_key_is_rejected() {
        let err = decode_response("444;#StepNo=1;#StepNo=2", &schema()).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateKey(key) if key == "StepNo"));

        let err = decode_response("444;Note=1; Note =2", &schema()).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateKey(key) if key == "Note"));
    }

    #[test]
    fn empty_body_is_rejected() {
        for text in ["", "444", "444;", "444;   ", "444;*"] {
            let err = decode_response(text, &schema()).unwrap_err();
            assert!(matches!(err, CodecError::EmptyResponse), "{text:?}");
        }
    }

    #[test]
    fn value_that_does_not_fit_kind_is_rejected() {
        let err = decode_response("444;#StepNo=70000", &schema()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                kind: ParameterKind::Int16,
                ..
            }
        ));

        let err = decode_response("444;MClass=abc", &schema()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidHeader {
                name: "MClass",
                ..
            }
        ));
    }

    #[test]
    fn empty_schema_passes_everything_through() {
        let package =
            decode_response("444;MClass=5;#StepNo=7", &ParameterSchema::empty()).unwrap();
        assert!(package.standard_parameters.is_empty());
        assert_eq!(
            package.service_specific_parameters.get("StepNo"),
            Some(&ParamValue::from("7"))
        );
    }

    #[test]
    fn decodes_bytes_and_rejects_non_utf8() {
        let package = decode_response_bytes(b"444;MClass=3;MNo=4", &schema()).unwrap();
        assert_eq!((package.message_class, package.message_number), (3, 4));

        let err = decode_response_bytes(&[0x34, 0x34, 0x34, 0x3B, 0xFF, 0xFE], &schema())
            .unwrap_err();
        assert!(matches!(err, CodecError::NotUtf8(_)));
    }

    #[test]
    fn encoded_request_decodes_against_same_schema() {
        let request = ServicePackage::request(200, 3)
            .with_parameter("StepNo", 12i16)
            .with_parameter("Barcode", "LOT-7");
        let wire = encode_request(&request, &resource(9)).unwrap();

        let decoded = decode_response(&wire, &schema()).unwrap();
        assert_eq!(decoded.message_class, 200);
        assert_eq!(decoded.standard_parameters, request.standard_parameters);
        assert_eq!(
            decoded.service_specific_parameters.get("RequestId"),
            Some(&ParamValue::from("9"))
        );
    }
}
