use crate::{models::DiagnosticsResponse, AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Report room/connection counts and process host stats
pub async fn diagnostics(
    State(state): State<AppState>,
) -> (StatusCode, Json<DiagnosticsResponse>) {

    // Aggregate counts from the hub
    let (n_conn, n_participants, n_rooms, n_pending_evictions) = {
        let hub = state.hub.lock().await;
        (
            hub.transport.connection_count() as u32,
            hub.registry.connection_count() as u32,
            hub.registry.room_count() as u32,
            hub.registry.pending_eviction_count() as u32,
        )
    };

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}, Pending evictions: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_rooms,
        n_pending_evictions
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            n_participants,
            n_rooms,
            n_pending_evictions,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
