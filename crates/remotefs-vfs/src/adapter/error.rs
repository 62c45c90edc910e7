//! Remote errors to [`VfsError`].
//!
//! Classification is best effort. Not-found is recognised from the return
//! code. Already-exists is recognised from the rendered text, which is the
//! only form in which every client surfaces it. Everything else passes
//! through with its message untouched.

use crate::remote::RemoteError;
use crate::vfs::{VfsError, VfsResult};

/// Text marker of an `EEXIST` failure in a rendered remote error.
const EXISTS_MARKER: &str = "ret=-17";

/// Translate a remote error into the generic taxonomy.
pub fn convert_err(err: RemoteError) -> VfsError {
    if err.is_not_exist() {
        return VfsError::NotFound(err.to_string());
    }
    let text = err.to_string();
    if has_exists_marker(&text) {
        return VfsError::AlreadyExists(text);
    }
    VfsError::Remote(err)
}

/// [`convert_err`] lifted over a result; success passes through untouched.
pub fn convert_result<T>(res: Result<T, RemoteError>) -> VfsResult<T> {
    res.map_err(convert_err)
}

/// `ret=-17` not followed by another digit, so `ret=-170` does not match.
fn has_exists_marker(text: &str) -> bool {
    text.match_indices(EXISTS_MARKER).any(|(idx, marker)| {
        !text[idx + marker.len()..].starts_with(|c: char| c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::consts::{EEXIST, EIO, ENOENT, ENOTEMPTY};

    #[test]
    fn test_ok_passes_through() {
        let res: Result<u32, RemoteError> = Ok(7);
        assert_eq!(convert_result(res).unwrap(), 7);
    }

    #[test]
    fn test_not_exist_maps_to_not_found() {
        let err = convert_err(RemoteError::errno(ENOENT));
        assert!(matches!(err, VfsError::NotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_exists_marker_maps_to_already_exists() {
        let err = convert_err(RemoteError::errno(EEXIST));
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        // recognised from text alone
        let err = convert_err(RemoteError::other("mkdir failed: ret=-17"));
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_marker_must_not_continue_with_digit() {
        let err = convert_err(RemoteError::other("ret=-170, odd"));
        assert!(matches!(err, VfsError::Remote(_)));
        assert!(has_exists_marker("ret=-170 then ret=-17."));
    }

    #[test]
    fn test_passthrough_keeps_message() {
        for remote in [
            RemoteError::errno(EIO),
            RemoteError::errno(ENOTEMPTY),
            RemoteError::other("connection reset"),
        ] {
            let text = remote.to_string();
            let err = convert_err(remote.clone());
            assert_eq!(err.to_string(), text);
            match err {
                VfsError::Remote(inner) => assert_eq!(inner, remote),
                other => panic!("expected passthrough, got {other:?}"),
            }
        }
    }
}
