/*
 * Responsibility
 * - Error codes emitted by the v1 canary API (group "canary.api.v1")
 */
use axum::http::StatusCode;

use crate::errcode::{ErrorCode, ErrorDescriptor, ErrorGroup};

pub const GROUP: &str = "canary.api.v1";

pub const TTL_INVALID: ErrorCode = ErrorCode(1004);
pub const CANARY_UNKNOWN: ErrorCode = ErrorCode(1005);
pub const CANARY_DEAD: ErrorCode = ErrorCode(1006);
pub const CANARY_INVALID: ErrorCode = ErrorCode(1007);
pub const WEBHOOK_INVALID: ErrorCode = ErrorCode(1008);
pub const WEBHOOK_UNKNOWN: ErrorCode = ErrorCode(1009);
pub const WEBHOOK_FAILED: ErrorCode = ErrorCode(1010);

pub static API_V1: ErrorGroup = ErrorGroup {
    name: GROUP,
    descriptors: &[
        ErrorDescriptor {
            code: TTL_INVALID,
            group: GROUP,
            value: "TTL_INVALID",
            message: "invalid ttl",
            description: "The ttl of a canary must be a positive number of seconds.",
            http_status: StatusCode::BAD_REQUEST,
        },
        ErrorDescriptor {
            code: CANARY_UNKNOWN,
            group: GROUP,
            value: "CANARY_UNKNOWN",
            message: "canary unknown",
            description: "No canary is stored under the requested id.",
            http_status: StatusCode::NOT_FOUND,
        },
        ErrorDescriptor {
            code: CANARY_DEAD,
            group: GROUP,
            value: "CANARY_DEAD",
            message: "canary is dead",
            description: "The canary was killed or was not refreshed before its deadline.",
            http_status: StatusCode::NOT_FOUND,
        },
        ErrorDescriptor {
            code: CANARY_INVALID,
            group: GROUP,
            value: "CANARY_INVALID",
            message: "invalid canary",
            description: "The canary payload could not be decoded or failed validation.",
            http_status: StatusCode::BAD_REQUEST,
        },
        ErrorDescriptor {
            code: WEBHOOK_INVALID,
            group: GROUP,
            value: "WEBHOOK_INVALID",
            message: "invalid webhook",
            description: "The webhook payload could not be decoded or failed validation.",
            http_status: StatusCode::BAD_REQUEST,
        },
        ErrorDescriptor {
            code: WEBHOOK_UNKNOWN,
            group: GROUP,
            value: "WEBHOOK_UNKNOWN",
            message: "webhook unknown",
            description: "No webhook with the requested id is registered on this canary.",
            http_status: StatusCode::NOT_FOUND,
        },
        ErrorDescriptor {
            code: WEBHOOK_FAILED,
            group: GROUP,
            value: "WEBHOOK_FAILED",
            message: "webhook delivery failed",
            description: "The request was accepted but the webhook endpoint could not be notified.",
            http_status: StatusCode::ACCEPTED,
        },
    ],
};
