use num_traits::Float;

/// Returns the height (meters) above ground of the point sighted at
/// `angle_deg` from an observer standing `distance_m` away with eyes
/// `eye_height_m` above ground.
///
/// Sighting below the ground line would produce a negative height,
/// which is not a valid geometry, so results are floored at zero.
pub fn height<T>(angle_deg: T, distance_m: T, eye_height_m: T) -> T
where
    T: Float,
{
    let h = eye_height_m + distance_m * angle_deg.to_radians().tan();
    h.max(T::zero())
}
