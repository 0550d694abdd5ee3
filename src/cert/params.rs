use std::str::FromStr;
use std::time::Duration as StdDuration;

use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use x509_cert::name::{Name, RdnSequence};
use x509_cert::time::Time;

use super::extensions::ToAndFromX509Extension;
use crate::error::{CertMgrError, Result};

/// Parses a distinguished name from its RFC 4514 string form, e.g. `CN=example.com,O=Example`.
///
/// # Errors
/// Returns [`CertMgrError::Validation`] if the string is not a valid distinguished name.
pub fn parse_dn(dn: &str) -> Result<Name> {
    RdnSequence::from_str(dn).map_err(|e| CertMgrError::Validation(format!("invalid DN '{dn}': {e}")))
}

/// Renders a distinguished name in its RFC 4514 string form.
pub fn dn_string(name: &Name) -> String {
    name.to_string()
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Converts the period into its X.509 form.
    pub fn to_x509_validity(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    /// Converts an X.509 validity into a `Validity`.
    pub fn from_x509_validity(validity: &x509_cert::time::Validity) -> Result<Self> {
        Ok(Self {
            not_before: from_x509_time(validity.not_before)?,
            not_after: from_x509_time(validity.not_after)?,
        })
    }
}

/// Converts a timestamp into an X.509 time.
///
/// Dates before 2050 are encoded as UTCTime, later ones as GeneralizedTime (RFC 5280, 4.1.2.5).
pub fn to_x509_time(timestamp: OffsetDateTime) -> Result<Time> {
    let seconds = u64::try_from(timestamp.unix_timestamp()).map_err(|_| {
        CertMgrError::Encoding(format!("timestamp before 1970 not supported: {timestamp}"))
    })?;
    let duration = StdDuration::from_secs(seconds);
    if timestamp.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_unix_duration(duration)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_unix_duration(duration)?))
    }
}

/// Converts an X.509 time into a timestamp.
pub fn from_x509_time(time: Time) -> Result<OffsetDateTime> {
    let duration = match time {
        Time::UtcTime(ut) => ut.to_unix_duration(),
        Time::GeneralTime(gt) => gt.to_unix_duration(),
    };
    let seconds = i64::try_from(duration.as_secs())
        .map_err(|e| CertMgrError::Decoding(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|e| CertMgrError::Decoding(e.to_string()))
}

/// Formats a timestamp as RFC 3339.
pub fn format_rfc3339(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn from_x509_extension(extension: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: extension.extn_id,
            critical: extension.critical,
            value: extension.extn_value.as_bytes().to_vec(),
        }
    }

    pub fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dn_round_trips_through_its_string_form() {
        let dn = "CN=Test Certificate,O=Example Org,C=DE";
        let name = parse_dn(dn).unwrap();
        assert_eq!(dn_string(&name), dn);
    }

    #[test]
    fn malformed_dn_is_a_validation_error() {
        let err = parse_dn("this is not a dn").unwrap_err();
        assert!(matches!(err, CertMgrError::Validation(_)));
        assert!(err.is_client_fault());
    }

    #[test]
    fn x509_time_switches_to_generalized_time_in_2050() {
        let before = OffsetDateTime::from_unix_timestamp(2_524_607_999).unwrap(); // 2049-12-31
        let after = OffsetDateTime::from_unix_timestamp(2_524_608_000).unwrap(); // 2050-01-01
        assert!(matches!(to_x509_time(before).unwrap(), Time::UtcTime(_)));
        assert!(matches!(to_x509_time(after).unwrap(), Time::GeneralTime(_)));
        assert_eq!(from_x509_time(to_x509_time(after).unwrap()).unwrap(), after);
    }

    #[test]
    fn rfc3339_formatting() {
        let timestamp = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(format_rfc3339(timestamp), "2023-11-14T22:13:20Z");
    }
}
