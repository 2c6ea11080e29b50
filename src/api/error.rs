//! Error-code catalogs for server-reported failures.
//!
//! The service reports numeric error codes in two distinct spaces: one for
//! file/quota operations and one for the passport login endpoints. Both
//! catalogs are immutable code-to-message tables; codes the service never
//! documented fall back to a generic message while still carrying the
//! numeric code.

/// Which error-code space a server-reported code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCatalog {
    /// File, directory, and quota operation errors.
    General,
    /// Passport login errors.
    Login,
}

impl ErrorCatalog {
    /// Look up the message for an error code, falling back to
    /// `"unknown error"` for unmapped codes.
    pub fn lookup(&self, code: i32) -> &'static str {
        let msg = match self {
            ErrorCatalog::General => general_message(code),
            ErrorCatalog::Login => login_message(code),
        };
        msg.unwrap_or("unknown error")
    }
}

fn general_message(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "success",
        1 => "server error",
        2 => "API request error, try again later",
        3 => "cannot operate on more than 100 files at once",
        4 => "invalid new file name",
        5 => "invalid target directory",
        6 => "reserved",
        7 => "illegal namespace or access denied",
        8 => "illegal id or access denied",
        9 => "failed to acquire key",
        10 => "failed to create superfile",
        11 => "user id or user name is invalid or does not exist",
        12 => "some files already exist in the target directory",
        13 => "this directory cannot be shared",
        14 => "system error",
        15 => "operation failed",
        102 => "no permission to operate on this directory",
        103 => "wrong extraction code",
        104 => "invalid verification cookie",
        111 => "there are unfinished tasks, finish them before operating",
        112 => "page expired, refresh and try again",
        132 => "identity verification required to delete files",
        201..=205 => "system error",
        211 => "no permission or account banned",
        301 => "other request error",
        404 => "rapid upload md5 mismatch",
        406 => "rapid upload file creation failed",
        407 => "fileModify returned an error without a request id",
        501 => "invalid list format returned",
        600 => "JSON parse error",
        601 => "exception thrown",
        617 => "file list retrieval error",
        618 => "HTTP request failed",
        619 => "PCS returned an error code",
        1024 => "print-service cart files cannot be deleted within 15 days",
        9100 | 9200 => "account frozen due to violations",
        9300 => "this feature is frozen due to account violations",
        9400 => "account anomaly, verification required before using this feature",
        9500 => "account in protection mode, change the password before use",
        31021 => "network connection failed, check the network and try again",
        31075 => "at most 999 items per operation",
        31080 => "server error, try again later",
        31116 => "insufficient storage space",
        -1 => "username and password verification failed",
        -2 => "reserved",
        -3 => "user not activated",
        -4 => "host_key and user_key not found in cookie",
        -5 => "host_key and user_key are invalid",
        -6 => "login failed, log in again",
        -7 => "invalid file or directory name, or access denied",
        -8 => "this file already exists in the directory",
        -9 => "file was deleted by its owner, operation failed",
        -10 | -32 => "insufficient storage space",
        -11 => "parent directory does not exist",
        -12 => "device not registered",
        -13 => "device already bound",
        -14 => "account already initialized",
        -21 => "preset files do not support this operation",
        -22 => "shared files cannot be renamed or moved",
        -23 => "database operation failed, contact the netdisk administrator",
        -24 => "the list contains files whose public status cannot be cancelled",
        -25 => "not a beta user",
        -26 => "invitation code expired",
        -102 => "print-service files cannot be deleted within 7 days",
        _ => return None,
    })
}

fn login_message(code: i32) -> Option<&'static str> {
    Some(match code {
        1 => "invalid account format",
        2 => "account does not exist",
        3 => "captcha does not exist or has expired, enter it again",
        4 => "wrong account or password",
        6 => "wrong captcha",
        7 => "wrong password",
        16 => "login restricted due to security issues",
        17 => "account locked",
        21 => "no login permission",
        257 => "captcha required",
        50023 => "a phone number can be rebound to at most 3 accounts within 30 days",
        50024 => "registering too frequently, try again later",
        50025 => "registering too frequently, try again later or register via SMS",
        100005 => "system error, try again later",
        100023 => "cookies must be enabled to log in",
        100027 => "system upgrade in progress, service temporarily unavailable",
        110024 => "account not activated yet",
        120019 => "complete the action in the popup window, or log in again",
        120021 => "login failed, complete the action in the popup window or log in again",
        200010 => "captcha does not exist or has expired",
        400031 => "complete the action in the popup window, or log in again",
        400414 | 400415 => "account temporarily frozen due to security issues",
        401007 => "your phone number is linked to other accounts, choose one to log in",
        500010 => "logging in too frequently, try again in 24 hours",
        -1 => "system error, try again later",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_lookup() {
        assert_eq!(ErrorCatalog::General.lookup(0), "success");
        assert_eq!(
            ErrorCatalog::General.lookup(-8),
            "this file already exists in the directory"
        );
        assert_eq!(
            ErrorCatalog::General.lookup(31116),
            "insufficient storage space"
        );
        assert_eq!(ErrorCatalog::General.lookup(202), "system error");
    }

    #[test]
    fn test_login_lookup() {
        assert_eq!(ErrorCatalog::Login.lookup(257), "captcha required");
        assert_eq!(ErrorCatalog::Login.lookup(4), "wrong account or password");
        assert_eq!(
            ErrorCatalog::Login.lookup(500010),
            "logging in too frequently, try again in 24 hours"
        );
    }

    #[test]
    fn test_catalogs_are_distinct() {
        // Code 4 means different things depending on which stage raised it.
        assert_eq!(ErrorCatalog::General.lookup(4), "invalid new file name");
        assert_eq!(ErrorCatalog::Login.lookup(4), "wrong account or password");
    }

    #[test]
    fn test_unknown_code_fallback() {
        assert_eq!(ErrorCatalog::General.lookup(123456), "unknown error");
        assert_eq!(ErrorCatalog::Login.lookup(-999), "unknown error");
    }
}
