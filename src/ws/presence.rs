use crate::models::Participant;
use super::room::Room;

/// Presence list of a room, in join order.
pub fn snapshot(room: &Room) -> Vec<Participant> {
    room.participants
        .iter()
        .map(|(id, user)| Participant {
            id: id.clone(),
            user: user.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserInfo;

    #[test]
    fn test_snapshot_follows_join_order() {
        let mut room = Room::new("r1");
        room.participants.insert("c2".to_string(), UserInfo::named("Bob"));
        room.participants.insert("c1".to_string(), UserInfo::named("Alice"));
        room.participants.insert("c3".to_string(), UserInfo::named("Carol"));
        room.participants.shift_remove("c1");

        let ids: Vec<_> = snapshot(&room).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["c2", "c3"]);
    }

    #[test]
    fn test_snapshot_of_empty_room() {
        assert!(snapshot(&Room::new("r1")).is_empty());
    }
}
