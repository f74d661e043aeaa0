//! Create, edit and delete design posts through `Requesting`.
//!
//! Each route runs Request (resolve the session) → Execute (call
//! `DesignPost`) → Respond, with failure rules answering the request when
//! any step refuses.

use concord_core::{Invocation, Pattern, SyncRule, Vars};

use super::helpers::{
    authenticate, request_to, reshape, respond_failure, respond_refused, sanitize_post,
    session_required,
};

const CREATE: &str = "/DesignPost/createPost";
const EDIT: &str = "/DesignPost/editPost";
const DELETE: &str = "/DesignPost/deletePost";

// ---------------------------------------------------------------------------
// createPost
// ---------------------------------------------------------------------------

fn create_post_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, template_id, title, description, image_url, post_id, post] = v.vars([
        "request",
        "userID",
        "templateID",
        "title",
        "description",
        "imageURL",
        "postID",
        "post",
    ]);
    SyncRule::new("CreatePostExecute")
        .when(
            request_to(CREATE, request)
                .input_var(template_id)
                .input_var(title)
                .input_var(description)
                .input_var(image_url),
        )
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("DesignPost", "createPost")
                .arg("authorID", user_id)
                .arg_var(template_id)
                .arg_var(title)
                .arg_var(description)
                .arg_var(image_url)
                .bind_var(post_id),
        )
        .then(
            Invocation::new("DesignPost", "getPost")
                .arg_var(post_id)
                .bind_var(post),
        )
}

fn create_post_respond(v: &mut Vars) -> SyncRule {
    let [request, post_id, post] = v.vars(["request", "postID", "post"]);
    SyncRule::new("CreatePostRespond")
        .when(request_to(CREATE, request))
        .when(Pattern::new("DesignPost", "createPost").output_var(post_id))
        .when(
            Pattern::new("DesignPost", "getPost")
                .input_var(post_id)
                .output_var(post),
        )
        .filter_map([], move |f| reshape(f, post, sanitize_post))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(post_id)
                .arg_var(post),
        )
}

// ---------------------------------------------------------------------------
// editPost
// ---------------------------------------------------------------------------

fn edit_post_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, title, description, image_url, success, post] = v.vars([
        "request",
        "userID",
        "postID",
        "title",
        "description",
        "imageURL",
        "success",
        "post",
    ]);
    SyncRule::new("EditPostExecute")
        .when(
            request_to(EDIT, request)
                .input_var(post_id)
                .input_var(title)
                .input_var(description)
                .input_var(image_url),
        )
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("DesignPost", "editPost")
                .arg_var(post_id)
                .arg_var(user_id)
                .arg_var(title)
                .arg_var(description)
                .arg_var(image_url)
                .bind_var(success),
        )
        .then(
            Invocation::new("DesignPost", "getPost")
                .arg_var(post_id)
                .bind_var(post),
        )
}

fn edit_post_respond(v: &mut Vars) -> SyncRule {
    let [request, post_id, post] = v.vars(["request", "postID", "post"]);
    SyncRule::new("EditPostRespond")
        .when(request_to(EDIT, request).input_var(post_id))
        .when(
            Pattern::new("DesignPost", "editPost")
                .input_var(post_id)
                .output("success", true),
        )
        .when(
            Pattern::new("DesignPost", "getPost")
                .input_var(post_id)
                .output_var(post),
        )
        .filter_map([], move |f| reshape(f, post, sanitize_post))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true)
                .arg_var(post),
        )
}

// ---------------------------------------------------------------------------
// deletePost
// ---------------------------------------------------------------------------

fn delete_post_execute(v: &mut Vars) -> SyncRule {
    let [request, user_id, post_id, success] = v.vars(["request", "userID", "postID", "success"]);
    SyncRule::new("DeletePostExecute")
        .when(request_to(DELETE, request).input_var(post_id))
        .when(Pattern::new("Session", "getSessionUser").output_var(user_id))
        .then(
            Invocation::new("DesignPost", "deletePost")
                .arg_var(post_id)
                .arg_var(user_id)
                .bind_var(success),
        )
}

fn delete_post_respond(v: &mut Vars) -> SyncRule {
    let request = v.var("request");
    SyncRule::new("DeletePostRespond")
        .when(request_to(DELETE, request))
        .when(Pattern::new("DesignPost", "deletePost").output("success", true))
        .then(
            Invocation::new("Requesting", "respond")
                .arg_var(request)
                .arg("success", true),
        )
}

/// Every post synchronization, in registration order.
pub fn rules() -> Vec<SyncRule> {
    vec![
        authenticate("CreatePostRequest", CREATE),
        SyncRule::declare(create_post_execute),
        SyncRule::declare(create_post_respond),
        respond_failure("CreatePostFailure", CREATE, "DesignPost", "createPost"),
        session_required("CreatePostUnauthorized", CREATE),
        authenticate("EditPostRequest", EDIT),
        SyncRule::declare(edit_post_execute),
        SyncRule::declare(edit_post_respond),
        respond_refused(
            "EditPostFailure",
            EDIT,
            "DesignPost",
            "editPost",
            "success",
            "Edit not permitted",
        ),
        respond_failure("EditPostInvalid", EDIT, "DesignPost", "editPost"),
        session_required("EditPostUnauthorized", EDIT),
        authenticate("DeletePostRequest", DELETE),
        SyncRule::declare(delete_post_execute),
        SyncRule::declare(delete_post_respond),
        respond_refused(
            "DeletePostFailure",
            DELETE,
            "DesignPost",
            "deletePost",
            "success",
            "Delete not permitted",
        ),
        respond_failure("DeletePostInvalid", DELETE, "DesignPost", "deletePost"),
        session_required("DeletePostUnauthorized", DELETE),
    ]
}
