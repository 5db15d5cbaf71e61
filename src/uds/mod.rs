//! Module for UDS (Unified diagnostic services - ISO14229)
//!
//! Requests are built from catalog names by [encode], sent and awaited by a [Transaction],
//! and the ECU's reply is matched back against the catalog by [decode].

use automotive_diag::ByteWrapper::Standard;
use automotive_diag::uds::{UdsError, UdsErrorByte};

mod decoder;
mod encoder;
mod transaction;

pub use decoder::*;
pub use encoder::*;
pub use transaction::*;

/// Service ID of every negative response
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;
/// Positive responses carry the request SID plus this offset
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// How a response SID relates to the SID that was sent
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    /// Response SID is the request SID + 0x40
    Positive,
    /// Response SID is 0x7F
    Negative,
    /// Anything else
    Unexpected,
}

/// Classifies a response SID against the request SID
pub fn classify(request_sid: u8, response_sid: u8) -> ResponseClass {
    if response_sid == NEGATIVE_RESPONSE_SID {
        ResponseClass::Negative
    } else if request_sid.checked_add(POSITIVE_RESPONSE_OFFSET) == Some(response_sid) {
        ResponseClass::Positive
    } else {
        ResponseClass::Unexpected
    }
}

/// Returns true if the frame is 'Request correctly received - response pending'
/// for the SID that was sent
pub fn is_response_pending(frame: &[u8], sent_sid: u8) -> bool {
    match frame {
        [NEGATIVE_RESPONSE_SID, sid, code] if *sid == sent_sid => matches!(
            UdsErrorByte::from(*code),
            Standard(UdsError::RequestCorrectlyReceivedResponsePending)
        ),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_of_session_control() {
        assert_eq!(classify(0x10, 0x50), ResponseClass::Positive);
        assert_eq!(classify(0x10, 0x7F), ResponseClass::Negative);
        assert_eq!(classify(0x10, 0x62), ResponseClass::Unexpected);
        assert_eq!(classify(0x10, 0x10), ResponseClass::Unexpected);
        // No overflow on high SIDs
        assert_eq!(classify(0xFF, 0x3F), ResponseClass::Unexpected);
    }

    #[test]
    fn pending_detection() {
        assert!(is_response_pending(&[0x7F, 0x2F, 0x78], 0x2F));
        assert!(is_response_pending(&[0x7F, 0x31, 0x78], 0x31));
        assert!(!is_response_pending(&[0x7F, 0x22, 0x78], 0x2F));
        assert!(!is_response_pending(&[0x7F, 0x2F, 0x31], 0x2F));
        assert!(!is_response_pending(&[0x7F, 0x2F, 0x78, 0x00], 0x2F));
        assert!(!is_response_pending(&[0x6F, 0x2F, 0x78], 0x2F));
    }
}
