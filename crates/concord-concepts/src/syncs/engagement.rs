//! Upvotes and comments. Every route requires a session, and upvotes and new
//! comments also require the post to exist.

use concord_core::{Invocation, Pattern, SyncRule, Vars};

use super::helpers::{
    authenticate, request_to, respond_failure, respond_refused, session_required,
};

const UPVOTE: &str = "/Engagement/toggleUpvote";
const ADD_COMMENT: &str = "/Engagement/addComment";
const EDIT_COMMENT: &str = "/Engagement/editComment";
const DELETE_COMMENT: &str = "/Engagement/deleteComment";

fn toggle_upvote_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, post, upvoted, total] =
        v.vars(["request", "userID", "postID", "post", "upvoted", "total"]);
    SyncRule::new("ToggleUpvoteExecute")
        .when(request_to(UPVOTE, request).input_var(post_id))
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("DesignPost", "getPost")
                .arg_var(post_id)
                .bind_var(post),
        )
        .then(
            Invocation::new("Engagement", "toggleUpvote")
                .arg_var(post_id)
                .arg_var(user_id)
                .bind_var(upvoted)
                .bind_var(total),
        )
}

fn toggle_upvote_respond(v: &mut Vars) -> SyncRule {
    let [request, upvoted, total] = v.vars(["request", "upvoted", "total"]);
    SyncRule::new("ToggleUpvoteRespond")
        .when(request_to(UPVOTE, request))
        .when(
            Pattern::new("Engagement", "toggleUpvote")
                .output_var(upvoted)
                .output_var(total),
        )
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(upvoted)
                .arg_var(total),
        )
}

fn add_comment_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, text, post, comment] =
        v.vars(["request", "userID", "postID", "text", "post", "comment"]);
    SyncRule::new("AddCommentExecute")
        .when(
            request_to(ADD_COMMENT, request)
                .input_var(post_id)
                .input_var(text),
        )
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("DesignPost", "getPost")
                .arg_var(post_id)
                .bind_var(post),
        )
        .then(
            Invocation::new("Engagement", "addComment")
                .arg_var(post_id)
                .arg("authorID", user_id)
                .arg_var(text)
                .bind_var(comment),
        )
}

fn add_comment_respond(v: &mut Vars) -> SyncRule {
    let [request, comment] = v.vars(["request", "comment"]);
    SyncRule::new("AddCommentRespond")
        .when(request_to(ADD_COMMENT, request))
        .when(Pattern::new("Engagement", "addComment").output_var(comment))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(comment),
        )
}

fn edit_comment_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, comment_id, new_text, success] = v.vars([
        "request",
        "userID",
        "postID",
        "commentID",
        "newText",
        "success",
    ]);
    SyncRule::new("EditCommentExecute")
        .when(
            request_to(EDIT_COMMENT, request)
                .input_var(post_id)
                .input_var(comment_id)
                .input_var(new_text),
        )
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("Engagement", "editComment")
                .arg_var(post_id)
                .arg_var(comment_id)
                .arg_var(user_id)
                .arg_var(new_text)
                .bind_var(success),
        )
}

fn delete_comment_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, comment_id, success] =
        v.vars(["request", "userID", "postID", "commentID", "success"]);
    SyncRule::new("DeleteCommentExecute")
        .when(
            request_to(DELETE_COMMENT, request)
                .input_var(post_id)
                .input_var(comment_id),
        )
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("Engagement", "deleteComment")
                .arg_var(post_id)
                .arg_var(comment_id)
                .arg_var(user_id)
                .bind_var(success),
        )
}

/// `respond { request, success: true }` once `operation` reports success.
fn respond_success(name: &str, path: &'static str, operation: &'static str) -> SyncRule {
    SyncRule::declare(|v| {
        let request = v.var("request");
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new("Engagement", operation).output("success", true))
            .then(
                Invocation::new("Requesting", "respond")
                    .arg_var(request)
                    .arg("success", true),
            )
    })
}

pub fn rules() -> Vec<SyncRule> {
    vec![
        authenticate("ToggleUpvoteRequest", UPVOTE),
        SyncRule::declare(toggle_upvote_execute),
        SyncRule::declare(toggle_upvote_respond),
        respond_failure("ToggleUpvoteMissingPost", UPVOTE, "DesignPost", "getPost"),
        respond_failure("ToggleUpvoteFailure", UPVOTE, "Engagement", "toggleUpvote"),
        session_required("ToggleUpvoteUnauthorized", UPVOTE),
        authenticate("AddCommentRequest", ADD_COMMENT),
        SyncRule::declare(add_comment_execute),
        SyncRule::declare(add_comment_respond),
        respond_failure("AddCommentMissingPost", ADD_COMMENT, "DesignPost", "getPost"),
        respond_failure("AddCommentFailure", ADD_COMMENT, "Engagement", "addComment"),
        session_required("AddCommentUnauthorized", ADD_COMMENT),
        authenticate("EditCommentRequest", EDIT_COMMENT),
        SyncRule::declare(edit_comment_execute),
        respond_success("EditCommentRespond", EDIT_COMMENT, "editComment"),
        respond_refused(
            "EditCommentFailure",
            EDIT_COMMENT,
            "Engagement",
            "editComment",
            "success",
            "Edit not permitted",
        ),
        respond_failure("EditCommentInvalid", EDIT_COMMENT, "Engagement", "editComment"),
        session_required("EditCommentUnauthorized", EDIT_COMMENT),
        authenticate("DeleteCommentRequest", DELETE_COMMENT),
        SyncRule::declare(delete_comment_execute),
        respond_success("DeleteCommentRespond", DELETE_COMMENT, "deleteComment"),
        respond_refused(
            "DeleteCommentFailure",
            DELETE_COMMENT,
            "Engagement",
            "deleteComment",
            "success",
            "Delete not permitted",
        ),
        respond_failure("DeleteCommentInvalid", DELETE_COMMENT, "Engagement", "deleteComment"),
        session_required("DeleteCommentUnauthorized", DELETE_COMMENT),
    ]
}
