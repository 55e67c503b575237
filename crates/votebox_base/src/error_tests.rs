/* 📖 # Why use a separate file for these error tests?

The Debug output of VoteboxError is a rendered tree. Keeping the snapshots in
their own file keeps the error module readable.
*/

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{ResultExt, VoteboxError, VoteboxResult};
    use expect_test::expect;
    use std::error::Error;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_error_from_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let path = PathBuf::from("questions.json");
        let error = VoteboxError::new(ErrorKind::FileError {
            path: path.clone(),
            source: io_err,
        });

        match error.kind() {
            ErrorKind::FileError { path: p, .. } => assert_eq!(p, &path),
            _ => panic!("Expected FileError variant"),
        }
    }

    #[test]
    fn test_error_context_attachment() {
        let error = VoteboxError::message("original error")
            .context("first context")
            .context("second context");

        assert_eq!(error.get_context().len(), 2);
        assert_eq!(error.get_context()[0], "first context");
        assert_eq!(error.get_context()[1], "second context");
    }

    #[test]
    fn test_error_with_context_lazy_evaluation() {
        let mut called = false;
        let error = VoteboxError::message("error").with_context(|| {
            called = true;
            "lazy context".to_string()
        });

        assert!(called);
        assert_eq!(error.get_context()[0], "lazy context");
    }

    #[test]
    fn test_error_display_with_multiple_contexts() {
        let error = VoteboxError::message("root error")
            .context("first")
            .context("second");
        assert_eq!(error.to_string(), "first: second: root error");
    }

    #[test]
    fn test_error_display_kinds() {
        assert_eq!(
            VoteboxError::not_found("option 7").to_string(),
            "option 7 not found"
        );
        assert_eq!(
            VoteboxError::constraint("duplicate option text 'Vim'").to_string(),
            "Constraint violated: duplicate option text 'Vim'"
        );
    }

    #[test]
    fn test_error_source_chain() {
        let inner = VoteboxError::new(ErrorKind::FileError {
            path: PathBuf::from("votebox.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        });
        let outer = VoteboxError::message("could not load config").caused_by(inner);

        assert!(outer.source().is_some());
        assert_eq!(outer.root_cause().to_string(), "access denied");
    }

    #[test]
    fn test_error_source_message() {
        let error = VoteboxError::message("test");
        assert!(error.source().is_none());
        assert_eq!(error.root_cause().to_string(), "test");
    }

    #[test]
    fn test_result_ext_chaining() {
        let result: VoteboxResult<i32> = Err(Box::new(VoteboxError::message("root")));
        let err = result
            .context("step 1")
            .with_context(|| "step 2".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "step 1: step 2: root");
    }

    #[test]
    fn test_result_ext_success_untouched() {
        let result: VoteboxResult<i32> = Ok(42);
        assert_eq!(result.context("unused").unwrap(), 42);
    }

    #[test]
    fn test_err_macro() {
        fn failing(id: u64) -> VoteboxResult<()> {
            crate::bail!("option {} is broken", id);
        }
        let err = failing(3).unwrap_err();
        assert_eq!(err.to_string(), "option 3 is broken");
        let boxed: Box<VoteboxError> = crate::err!("plain {}", "message");
        assert_eq!(boxed.to_string(), "plain message");
    }

    #[test]
    fn test_debug_pretty_print_format() {
        let error = VoteboxError::message("something went wrong")
            .context("while applying vote")
            .context("for user 4");

        expect![[r#"
            something went wrong
            ├─ while applying vote
            └─ for user 4

        "#]]
        .assert_debug_eq(&error);
    }

    #[test]
    fn test_debug_nested_errors() {
        let inner_error = VoteboxError::constraint("duplicate username").context("inner context");
        let outer_error = VoteboxError::message("seeding users failed")
            .context("outer context")
            .caused_by(inner_error);

        expect![[r#"
            seeding users failed
            ├─ outer context
            └─ cause: Constraint violated: duplicate username
               └─ inner context

        "#]]
        .assert_debug_eq(&outer_error);
    }
}
